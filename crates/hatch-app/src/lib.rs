//! Application layer for hatch: the stdio boundary on the host side and the
//! terminal multiplexer on the view side.
//!
//! Architecture:
//! - `ipc` defines the wire contract (requests, reply envelopes, pushed
//!   output events).
//! - `bridge` dispatches requests against the session registry, the
//!   database, and the collaborator seams.
//! - `server` runs the JSON-lines loop over stdin/stdout.
//! - `mux` + `fit` are the view side: cached rendering engines keyed by
//!   session id and pixel-to-cell resize coordination.

pub mod bridge;
pub mod collab;
pub mod fit;
pub mod ipc;
pub mod mux;
pub mod server;
