use std::io::{Read, Write};
use std::path::Path;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

/// Errors from PTY operations.
#[derive(Debug)]
pub enum PtyError {
    SpawnFailed(String),
    IoError(std::io::Error),
    ResizeFailed(String),
}

impl std::fmt::Display for PtyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PtyError::SpawnFailed(msg) => write!(f, "PTY spawn failed: {msg}"),
            PtyError::IoError(err) => write!(f, "PTY I/O error: {err}"),
            PtyError::ResizeFailed(msg) => write!(f, "PTY resize failed: {msg}"),
        }
    }
}

impl std::error::Error for PtyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PtyError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PtyError {
    fn from(err: std::io::Error) -> Self {
        PtyError::IoError(err)
    }
}

/// Owns a portable-pty child process, master pair, reader, and writer.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl PtyHandle {
    /// Spawn an interactive login shell in `cwd` with the given dimensions.
    ///
    /// If `shell` is `None`, uses the user's default shell (`$SHELL` or
    /// `/bin/sh`). The environment is augmented with common executable
    /// locations so the agent binary is found even when launched outside a
    /// normal login environment.
    pub fn spawn(
        shell: Option<&str>,
        cwd: &Path,
        cols: u16,
        rows: u16,
    ) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let shell_path = match shell {
            Some(s) => s.to_string(),
            None => default_shell(),
        };

        let mut cmd = CommandBuilder::new(&shell_path);
        cmd.args(["-l", "-i"]);
        cmd.cwd(cwd);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        cmd.env("PATH", augmented_path());

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn {shell_path}: {e}")))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;

        Ok(Self {
            master: pair.master,
            reader: Some(reader),
            writer,
            child,
        })
    }

    /// The OS process id of the shell, if still known.
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(format!("{e}")))
    }

    /// Write bytes to the PTY master (user input -> shell).
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Extract the PTY reader for use in a dedicated I/O thread.
    ///
    /// The reader performs blocking reads and must not live behind the
    /// registry lock. Returns `None` if the reader was already taken.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    /// Get the child's exit status if it has already exited.
    pub fn try_wait(&mut self) -> Option<u32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            _ => None,
        }
    }

    /// Block until the child exits and return its exit code.
    ///
    /// Only call this after the reader has hit EOF; at that point the child
    /// is gone or imminently so, and the wait is effectively immediate.
    pub fn wait_exit(&mut self) -> Option<u32> {
        self.child.wait().ok().map(|status| status.exit_code())
    }

    /// Signal the child process to terminate.
    pub fn kill(&mut self) -> Result<(), PtyError> {
        self.child.kill().map_err(PtyError::from)
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        // A session being destroyed always terminates its process.
        if self.child.try_wait().ok().flatten().is_none() {
            let _ = self.child.kill();
        }
    }
}

/// Returns the user's default shell, falling back to `/bin/sh`.
fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

/// PATH with common agent install locations appended.
fn augmented_path() -> String {
    let base = std::env::var("PATH").unwrap_or_default();
    let home = std::env::var("HOME").unwrap_or_default();
    format!(
        "{base}:/usr/local/bin:/opt/homebrew/bin:{home}/.local/bin:{home}/.npm-global/bin"
    )
}
