use std::collections::VecDeque;

/// Characters that mark an idle shell prompt when they end the output.
///
/// Covers bash/zsh (`$`, `%`), fish (`>`), root shells (`#`), and common
/// prompt themes (`❯`, `→`).
const PROMPT_SENTINELS: [char; 6] = ['$', '%', '>', '#', '❯', '→'];

/// How many stripped characters of trailing output to keep for matching.
const TAIL_WINDOW: usize = 64;

/// Scanner state for escape sequence recognition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    /// Plain text.
    Ground,
    /// Seen ESC, dispatching on the next byte.
    Esc,
    /// Inside a CSI sequence (`ESC [` ... final byte `@`..`~`).
    Csi,
    /// Inside an OSC sequence (`ESC ]` ... BEL or ST).
    Osc,
    /// Seen ESC inside an OSC; `\` completes the ST terminator.
    OscEsc,
}

/// Incremental escape-sequence filter over streaming shell output.
///
/// Feeds each chunk through a small state machine that drops CSI and OSC
/// sequences (even when split across chunk boundaries) and keeps a bounded
/// trailing window of the remaining text. Work is linear in the number of
/// bytes fed; earlier output is never re-scanned.
pub struct AnsiFilter {
    state: ScanState,
    /// Carry-over for a UTF-8 code point split across chunks.
    partial: Vec<u8>,
    tail: VecDeque<char>,
}

impl AnsiFilter {
    pub fn new() -> Self {
        Self {
            state: ScanState::Ground,
            partial: Vec::new(),
            tail: VecDeque::with_capacity(TAIL_WINDOW),
        }
    }

    /// Feed a chunk of raw output.
    ///
    /// Decodes lossily: invalid bytes become U+FFFD and scanning continues,
    /// so a prompt later in the same chunk is still seen. Only a genuinely
    /// incomplete trailing code point is carried to the next chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.extend_from_slice(chunk);

        let mut kept: Vec<char> = Vec::new();
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    for c in text.chars() {
                        self.step(c, &mut kept);
                    }
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&rest[..valid]) {
                        for c in text.chars() {
                            self.step(c, &mut kept);
                        }
                    }
                    match e.error_len() {
                        Some(n) => {
                            self.step(char::REPLACEMENT_CHARACTER, &mut kept);
                            rest = &rest[valid + n..];
                        }
                        // Split code point at the chunk boundary, at most 3
                        // bytes; completed by the next chunk.
                        None => {
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }

        for c in kept {
            if self.tail.len() == TAIL_WINDOW {
                self.tail.pop_front();
            }
            self.tail.push_back(c);
        }

        self.partial = rest.to_vec();
    }

    fn step(&mut self, c: char, kept: &mut Vec<char>) {
        match self.state {
            ScanState::Ground => match c {
                '\x1b' => self.state = ScanState::Esc,
                // BEL outside an OSC carries no text.
                '\x07' => {}
                _ => kept.push(c),
            },
            ScanState::Esc => match c {
                '[' => self.state = ScanState::Csi,
                ']' => self.state = ScanState::Osc,
                // Two-character escape (e.g. ESC 7); consumed entirely.
                _ => self.state = ScanState::Ground,
            },
            ScanState::Csi => {
                // Parameter/intermediate bytes are 0x20..=0x3f; the final
                // byte 0x40..=0x7e ends the sequence.
                if ('\x40'..='\x7e').contains(&c) {
                    self.state = ScanState::Ground;
                }
            }
            ScanState::Osc => match c {
                '\x07' => self.state = ScanState::Ground,
                '\x1b' => self.state = ScanState::OscEsc,
                _ => {}
            },
            ScanState::OscEsc => match c {
                '\\' => self.state = ScanState::Ground,
                _ => self.state = ScanState::Osc,
            },
        }
    }

    /// True if the stripped output currently ends in a prompt sentinel,
    /// ignoring trailing whitespace.
    pub fn ends_with_prompt(&self) -> bool {
        self.tail
            .iter()
            .rev()
            .find(|c| !c.is_whitespace())
            .map(|c| PROMPT_SENTINELS.contains(c))
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn tail_string(&self) -> String {
        self.tail.iter().collect()
    }
}

impl Default for AnsiFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot launch latch for a session's agent bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchState {
    /// No prompt seen yet.
    NotLaunched,
    /// Prompt seen; settle delay armed, launch write pending.
    Scheduled,
    /// Launch command written. Terminal state; never re-fires.
    Launched,
}

/// Watches a session's output stream for shell readiness.
///
/// The detector consumes each chunk as it arrives. The first time the
/// stripped output ends in a prompt sentinel, the state moves from
/// `NotLaunched` to `Scheduled` and the caller arms the settle delay; once
/// the launch command has been written the state latches at `Launched` for
/// the rest of the session, no matter how often the prompt reappears.
pub struct ReadinessDetector {
    filter: AnsiFilter,
    state: LaunchState,
}

impl ReadinessDetector {
    pub fn new() -> Self {
        Self {
            filter: AnsiFilter::new(),
            state: LaunchState::NotLaunched,
        }
    }

    /// Feed a chunk of session output.
    ///
    /// Returns `true` exactly once per session: on the chunk that first
    /// makes the stripped output end in a prompt sentinel.
    pub fn observe(&mut self, chunk: &[u8]) -> bool {
        self.filter.push(chunk);

        if self.state == LaunchState::NotLaunched && self.filter.ends_with_prompt() {
            self.state = LaunchState::Scheduled;
            return true;
        }
        false
    }

    /// Record that the launch command has been written.
    pub fn mark_launched(&mut self) {
        self.state = LaunchState::Launched;
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }
}

impl Default for ReadinessDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_prompt_matches() {
        let mut filter = AnsiFilter::new();
        filter.push(b"bash-3.2$ ");
        assert!(filter.ends_with_prompt());
    }

    #[test]
    fn test_prompt_with_trailing_whitespace() {
        let mut filter = AnsiFilter::new();
        filter.push(b"host% \t ");
        assert!(filter.ends_with_prompt());
    }

    #[test]
    fn test_mid_line_sentinel_does_not_match() {
        let mut filter = AnsiFilter::new();
        filter.push(b"$ ls -la\r\ntotal 0\r\n");
        assert!(!filter.ends_with_prompt());
    }

    #[test]
    fn test_csi_sequences_stripped() {
        let mut filter = AnsiFilter::new();
        // Colored prompt: the trailing SGR reset must not hide the sentinel.
        filter.push(b"\x1b[32muser@host\x1b[0m$ \x1b[?2004h");
        assert!(filter.ends_with_prompt());
        assert_eq!(filter.tail_string(), "user@host$ ");
    }

    #[test]
    fn test_osc_title_stripped() {
        let mut filter = AnsiFilter::new();
        filter.push(b"\x1b]0;window title with > inside\x07% ");
        assert!(filter.ends_with_prompt());
        assert_eq!(filter.tail_string(), "% ");
    }

    #[test]
    fn test_osc_split_across_chunks() {
        let mut filter = AnsiFilter::new();
        filter.push(b"\x1b]0;half a ti");
        assert!(!filter.ends_with_prompt());
        filter.push(b"tle\x07zsh% ");
        assert!(filter.ends_with_prompt());
        assert_eq!(filter.tail_string(), "zsh% ");
    }

    #[test]
    fn test_csi_split_across_chunks() {
        let mut filter = AnsiFilter::new();
        filter.push(b"\x1b[38;5");
        filter.push(b";245m$ ");
        assert!(filter.ends_with_prompt());
        assert_eq!(filter.tail_string(), "$ ");
    }

    #[test]
    fn test_osc_with_st_terminator() {
        let mut filter = AnsiFilter::new();
        filter.push(b"\x1b]2;title\x1b\\# ");
        assert!(filter.ends_with_prompt());
        assert_eq!(filter.tail_string(), "# ");
    }

    #[test]
    fn test_invalid_byte_keeps_scanning_to_prompt() {
        let mut filter = AnsiFilter::new();
        // A stray non-UTF-8 byte must not swallow the rest of the chunk.
        filter.push(b"\xffLast login\r\nbash-3.2$ ");
        assert!(filter.ends_with_prompt());
        assert!(filter.tail_string().starts_with('\u{fffd}'));
    }

    #[test]
    fn test_invalid_bytes_between_valid_text() {
        let mut filter = AnsiFilter::new();
        filter.push(b"motd\xfe\xff\r\n");
        filter.push(b"host% ");
        assert!(filter.ends_with_prompt());
    }

    #[test]
    fn test_unicode_prompt_glyph() {
        let mut filter = AnsiFilter::new();
        filter.push("~/project \u{276f} ".as_bytes());
        assert!(filter.ends_with_prompt());
    }

    #[test]
    fn test_unicode_glyph_split_across_chunks() {
        let glyph = "\u{276f}".as_bytes(); // 3 bytes
        let mut filter = AnsiFilter::new();
        filter.push(&glyph[..1]);
        filter.push(&glyph[1..]);
        filter.push(b" ");
        assert!(filter.ends_with_prompt());
    }

    #[test]
    fn test_empty_output_never_matches() {
        let filter = AnsiFilter::new();
        assert!(!filter.ends_with_prompt());
    }

    #[test]
    fn test_detector_fires_once() {
        let mut detector = ReadinessDetector::new();
        assert!(detector.observe(b"bash-3.2$ "));
        assert_eq!(detector.state(), LaunchState::Scheduled);

        // Prompt re-appears; already scheduled, must not fire again.
        assert!(!detector.observe(b"\r\nbash-3.2$ "));

        detector.mark_launched();
        assert!(!detector.observe(b"\r\nbash-3.2$ "));
        assert_eq!(detector.state(), LaunchState::Launched);
    }

    #[test]
    fn test_detector_waits_for_prompt() {
        let mut detector = ReadinessDetector::new();
        assert!(!detector.observe(b"Last login: Mon Jan 6\r\n"));
        assert!(!detector.observe(b"motd text\r\n"));
        assert!(detector.observe(b"host$ "));
    }

    #[test]
    fn test_detector_linear_over_many_chunks() {
        // A long stream without a prompt must never trigger and must not
        // accumulate unbounded state.
        let mut detector = ReadinessDetector::new();
        for _ in 0..10_000 {
            assert!(!detector.observe(b"log line without sentinel\r\n"));
        }
        assert_eq!(detector.state(), LaunchState::NotLaunched);
    }
}
