//! Wire types for the stdio boundary.
//!
//! One JSON object per line in each direction: requests come in, reply
//! envelopes and pushed output events go out. Field names follow the
//! frontend's camelCase convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hatch_pty::{SessionId, SessionSnapshot, SessionSummary};

/// A single request line. `seq` is an optional client-chosen correlation
/// number echoed back on the reply.
#[derive(Deserialize, Debug)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(flatten)]
    pub request: Request,
}

/// Every operation the boundary accepts, dispatched on `op`.
#[derive(Deserialize, Debug)]
#[serde(tag = "op")]
pub enum Request {
    #[serde(rename = "sessions:create")]
    SessionsCreate {
        cwd: String,
        #[serde(default, rename = "dangerousMode")]
        dangerous_mode: bool,
    },
    #[serde(rename = "sessions:kill")]
    SessionsKill { id: SessionId },
    #[serde(rename = "sessions:list")]
    SessionsList,
    #[serde(rename = "sessions:get")]
    SessionsGet { id: SessionId },
    #[serde(rename = "sessions:write")]
    SessionsWrite { id: SessionId, data: String },
    #[serde(rename = "sessions:resize")]
    SessionsResize { id: SessionId, cols: u16, rows: u16 },
    #[serde(rename = "pins:get")]
    PinsGet,
    #[serde(rename = "pins:add")]
    PinsAdd { path: String },
    #[serde(rename = "pins:remove")]
    PinsRemove { path: String },
    #[serde(rename = "modes:get")]
    ModesGet { path: String },
    #[serde(rename = "modes:set")]
    ModesSet {
        path: String,
        #[serde(rename = "dangerousMode")]
        dangerous_mode: bool,
    },
    #[serde(rename = "home:dir")]
    HomeDir,
    #[serde(rename = "dialog:selectDirectory")]
    DialogSelectDirectory,
    #[serde(rename = "editor:open")]
    EditorOpen { path: String },
}

/// Error taxonomy exposed over the wire.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    SpawnFailure,
    TransportFailure,
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Uniform reply envelope: `{ok, data}` on success,
/// `{ok: false, error: {kind, message}}` on failure.
#[derive(Serialize, Debug)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    pub fn ok(seq: Option<u64>, data: Value) -> Self {
        Self {
            ok: true,
            seq,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(seq: Option<u64>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            seq,
            data: None,
            error: Some(ErrorBody {
                kind,
                message: message.into(),
            }),
        }
    }
}

/// Pushed event for session output and exit. Exit is delivered here with
/// `meta.exited` set, never as an error reply.
#[derive(Serialize, Debug)]
pub struct OutputEvent {
    pub event: &'static str,
    pub id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<OutputMeta>,
}

#[derive(Serialize, Debug)]
pub struct OutputMeta {
    pub exited: bool,
    #[serde(rename = "exitCode")]
    pub exit_code: Option<u32>,
}

impl OutputEvent {
    pub fn data(id: SessionId, chunk: &[u8]) -> Self {
        Self {
            event: "sessions:output",
            id,
            data: Some(String::from_utf8_lossy(chunk).into_owned()),
            meta: None,
        }
    }

    pub fn exited(id: SessionId, exit_code: Option<u32>) -> Self {
        Self {
            event: "sessions:output",
            id,
            data: None,
            meta: Some(OutputMeta {
                exited: true,
                exit_code,
            }),
        }
    }
}

/// Wire form of a session listing entry.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDto {
    pub id: SessionId,
    pub cwd: String,
    pub pid: Option<u32>,
    pub dangerous_mode: bool,
    pub created_at: u64,
    pub last_activity: u64,
    pub preview: Vec<String>,
}

impl From<SessionSummary> for SummaryDto {
    fn from(s: SessionSummary) -> Self {
        Self {
            id: s.id,
            cwd: s.cwd.to_string_lossy().into_owned(),
            pid: s.pid,
            dangerous_mode: s.dangerous_mode,
            created_at: s.created_at,
            last_activity: s.last_activity,
            preview: s.preview,
        }
    }
}

/// Wire form of a full session snapshot.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub id: SessionId,
    pub cwd: String,
    pub pid: Option<u32>,
    pub dangerous_mode: bool,
    pub created_at: u64,
    pub last_activity: u64,
    pub recent_output: String,
}

impl From<SessionSnapshot> for SnapshotDto {
    fn from(s: SessionSnapshot) -> Self {
        Self {
            id: s.id,
            cwd: s.cwd.to_string_lossy().into_owned(),
            pid: s.pid,
            dangerous_mode: s.dangerous_mode,
            created_at: s.created_at,
            last_activity: s.last_activity,
            recent_output: s.recent_output,
        }
    }
}
