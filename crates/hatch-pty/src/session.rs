use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::buffers::{LineBuffer, RawBuffer};
use crate::pty::PtyHandle;
use crate::readiness::ReadinessDetector;

/// Unique identifier for a session. Strictly increasing per registry.
pub type SessionId = u64;

/// Preview lines returned by a session listing.
pub const PREVIEW_LINES: usize = 4;

/// A host-side session: one PTY-backed shell plus its bookkeeping.
///
/// The session owns its process exclusively. It is created synchronously
/// when the registry handles a create request and destroyed either on an
/// explicit kill or when the process exits on its own.
pub struct Session {
    pub id: SessionId,
    pub pid: Option<u32>,
    pub cwd: PathBuf,
    pub dangerous_mode: bool,
    /// Epoch milliseconds.
    pub created_at: u64,
    /// Epoch milliseconds; bumped on every output chunk.
    pub last_activity: u64,
    pub raw: RawBuffer,
    pub lines: LineBuffer,
    pub readiness: ReadinessDetector,
    pub pty: PtyHandle,
}

impl Session {
    pub fn new(id: SessionId, cwd: PathBuf, dangerous_mode: bool, pty: PtyHandle) -> Self {
        let now = now_millis();
        Self {
            id,
            pid: pty.pid(),
            cwd,
            dangerous_mode,
            created_at: now,
            last_activity: now,
            raw: RawBuffer::default(),
            lines: LineBuffer::default(),
            readiness: ReadinessDetector::default(),
            pty,
        }
    }

    /// Record an output chunk: bump activity, fill both buffers, and run the
    /// readiness detector.
    ///
    /// Returns `true` when this chunk first made the shell look ready and
    /// the agent launch should be scheduled.
    pub fn record_output(&mut self, chunk: &[u8]) -> bool {
        self.last_activity = now_millis();
        self.raw.push_chunk(chunk);
        self.lines.push_chunk(chunk);
        self.readiness.observe(chunk)
    }

    /// Full snapshot including the raw buffer, for verbatim replay.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            cwd: self.cwd.clone(),
            pid: self.pid,
            dangerous_mode: self.dangerous_mode,
            created_at: self.created_at,
            last_activity: self.last_activity,
            recent_output: String::from_utf8_lossy(&self.raw.contents()).into_owned(),
        }
    }

    /// Listing entry with the last few non-empty output lines.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            cwd: self.cwd.clone(),
            pid: self.pid,
            dangerous_mode: self.dangerous_mode,
            created_at: self.created_at,
            last_activity: self.last_activity,
            preview: self.lines.preview(PREVIEW_LINES),
        }
    }
}

/// Point-in-time view of one session, raw output included.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub cwd: PathBuf,
    pub pid: Option<u32>,
    pub dangerous_mode: bool,
    pub created_at: u64,
    pub last_activity: u64,
    /// Raw buffer contents, escape sequences intact.
    pub recent_output: String,
}

/// Listing view of one session with preview lines instead of raw output.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub id: SessionId,
    pub cwd: PathBuf,
    pub pid: Option<u32>,
    pub dangerous_mode: bool,
    pub created_at: u64,
    pub last_activity: u64,
    pub preview: Vec<String>,
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
