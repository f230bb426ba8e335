//! hatch-pty: session orchestration for Hatch.
//!
//! This crate owns the host side of the system: one PTY-backed interactive
//! login shell per session, bounded replay/preview buffers, prompt-readiness
//! detection with a one-shot agent launch, and a registry that fans every
//! output event out to all subscribers.
//!
//! # Architecture
//!
//! - [`PtyHandle`] — low-level PTY process management (spawn, read, write,
//!   resize, kill).
//! - [`RawBuffer`] / [`LineBuffer`] — bounded output windows for verbatim
//!   replay and lightweight previews.
//! - [`ReadinessDetector`] — incremental ANSI-stripping scanner that spots an
//!   idle shell prompt and latches after the agent has been launched once.
//! - [`Session`] — pairs a `PtyHandle` with its buffers and metadata.
//! - [`SessionRegistry`] — id allocation, lifecycle, and output fan-out.

pub mod buffers;
pub mod pty;
pub mod readiness;
pub mod registry;
pub mod session;

pub use buffers::{LineBuffer, RawBuffer, LINE_BUFFER_CAP, RAW_BUFFER_CAP};
pub use pty::{PtyError, PtyHandle};
pub use readiness::{LaunchState, ReadinessDetector};
pub use registry::{
    CreatedSession, RegistryConfig, RegistryError, SessionEvent, SessionRegistry, SubscriberId,
};
pub use session::{Session, SessionId, SessionSnapshot, SessionSummary};
