use std::collections::VecDeque;

/// Maximum bytes of raw output kept per session (~100KB).
pub const RAW_BUFFER_CAP: usize = 100_000;

/// Maximum lines of preview text kept per session.
pub const LINE_BUFFER_CAP: usize = 1_000;

/// Bounded, newest-biased window over raw session output.
///
/// Preserves exact bytes, escape sequences included, so a terminal engine
/// can replay the session verbatim. When the cap is exceeded the oldest
/// bytes are dropped; the newest bytes are never lost.
pub struct RawBuffer {
    data: VecDeque<u8>,
    cap: usize,
}

impl RawBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(cap.min(4096)),
            cap,
        }
    }

    /// Append a chunk, evicting from the front once over the cap.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.cap {
            // Chunk alone fills the window; keep only its tail.
            self.data.clear();
            self.data.extend(&chunk[chunk.len() - self.cap..]);
            return;
        }
        self.data.extend(chunk);
        while self.data.len() > self.cap {
            self.data.pop_front();
        }
    }

    /// The buffered bytes, oldest first.
    pub fn contents(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for RawBuffer {
    fn default() -> Self {
        Self::new(RAW_BUFFER_CAP)
    }
}

/// Bounded window of newline-delimited output text, for preview cards.
///
/// Incoming chunks are split on `\n` and appended as-is; partial lines are
/// stored like any other and filtered later by [`LineBuffer::preview`].
pub struct LineBuffer {
    lines: VecDeque<String>,
    cap: usize,
}

impl LineBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            cap,
        }
    }

    /// Split a chunk of output on newlines and append the pieces.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        for piece in text.split('\n') {
            self.lines.push_back(piece.to_string());
        }
        while self.lines.len() > self.cap {
            self.lines.pop_front();
        }
    }

    /// The last `n` non-whitespace lines, oldest of the selected lines first.
    pub fn preview(&self, n: usize) -> Vec<String> {
        let meaningful: Vec<&String> = self
            .lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .collect();
        let start = meaningful.len().saturating_sub(n);
        meaningful[start..].iter().map(|s| s.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(LINE_BUFFER_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_buffer_keeps_newest() {
        let mut buf = RawBuffer::new(8);
        buf.push_chunk(b"abcdef");
        buf.push_chunk(b"ghij");
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.contents(), b"cdefghij");
    }

    #[test]
    fn test_raw_buffer_oversized_chunk() {
        let mut buf = RawBuffer::new(4);
        buf.push_chunk(b"0123456789");
        assert_eq!(buf.contents(), b"6789");
    }

    #[test]
    fn test_raw_buffer_never_exceeds_cap() {
        let mut buf = RawBuffer::new(100);
        for _ in 0..50 {
            buf.push_chunk(b"0123456789");
        }
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn test_raw_buffer_preserves_escape_sequences() {
        let mut buf = RawBuffer::new(64);
        buf.push_chunk(b"\x1b[31mred\x1b[0m");
        assert_eq!(buf.contents(), b"\x1b[31mred\x1b[0m");
    }

    #[test]
    fn test_line_buffer_splits_on_newline() {
        let mut buf = LineBuffer::new(10);
        buf.push_chunk(b"one\ntwo\nthree");
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_line_buffer_evicts_oldest() {
        let mut buf = LineBuffer::new(3);
        buf.push_chunk(b"a\nb\nc\nd\ne");
        assert_eq!(buf.preview(10), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_preview_filters_whitespace_lines() {
        let mut buf = LineBuffer::new(20);
        buf.push_chunk(b"first\n   \n\t\nsecond\n\nthird\n");
        let preview = buf.preview(4);
        assert_eq!(preview, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_preview_oldest_first_among_selected() {
        let mut buf = LineBuffer::new(20);
        buf.push_chunk(b"1\n2\n3\n4\n5\n");
        assert_eq!(buf.preview(3), vec!["3", "4", "5"]);
    }

    #[test]
    fn test_preview_at_most_n() {
        let mut buf = LineBuffer::new(20);
        buf.push_chunk(b"a\nb\n");
        assert!(buf.preview(3).len() <= 3);
        assert_eq!(buf.preview(3), vec!["a", "b"]);
    }
}
