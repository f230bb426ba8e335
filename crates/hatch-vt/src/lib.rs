//! hatch-vt: live terminal state engine for Hatch.
//!
//! Wraps `alacritty_terminal` behind a small API that parses raw PTY output
//! and maintains grid, cursor, and scrollback state for one session. The
//! UI-side multiplexer keeps one [`Engine`] per session so a session's
//! terminal state survives view switches without re-replaying output.
//!
//! This crate deliberately knows nothing about pixels or colors; it tracks
//! what is on the screen, not how it is drawn.

pub mod cell;
pub mod engine;
pub mod grid;

pub use cell::{Cell, CellFlags};
pub use engine::Engine;
pub use grid::{CursorShape, CursorState, GridView};
