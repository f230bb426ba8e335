//! Request dispatch: wire requests in, reply envelopes out.
//!
//! The bridge owns the database connection and the collaborator seams and
//! borrows the registry. Every outcome becomes a uniform reply envelope;
//! nothing here panics on bad input.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;

use hatch_pty::{RegistryError, SessionRegistry};

use crate::collab::{self, DirectoryPicker};
use crate::ipc::{ErrorKind, Reply, Request, RequestEnvelope, SnapshotDto, SummaryDto};

pub struct Bridge {
    registry: Arc<SessionRegistry>,
    db: Mutex<Connection>,
    picker: Box<dyn DirectoryPicker>,
}

impl Bridge {
    pub fn new(
        registry: Arc<SessionRegistry>,
        db: Connection,
        picker: Box<dyn DirectoryPicker>,
    ) -> Self {
        Self {
            registry,
            db: Mutex::new(db),
            picker,
        }
    }

    pub fn handle(&self, envelope: RequestEnvelope) -> Reply {
        let seq = envelope.seq;
        match envelope.request {
            Request::SessionsCreate {
                cwd,
                dangerous_mode,
            } => match self.registry.create(&PathBuf::from(cwd), dangerous_mode) {
                Ok(created) => json_ok(
                    seq,
                    serde_json::json!({
                        "id": created.id,
                        "cwd": created.cwd.to_string_lossy(),
                        "pid": created.pid,
                    }),
                ),
                Err(e) => registry_error(seq, e),
            },
            Request::SessionsKill { id } => json_ok(seq, self.registry.kill(id)),
            Request::SessionsList => {
                let summaries: Vec<SummaryDto> = self
                    .registry
                    .list_all()
                    .into_iter()
                    .map(SummaryDto::from)
                    .collect();
                json_ok(seq, summaries)
            }
            Request::SessionsGet { id } => match self.registry.get(id) {
                Ok(snapshot) => json_ok(seq, SnapshotDto::from(snapshot)),
                Err(e) => registry_error(seq, e),
            },
            Request::SessionsWrite { id, data } => match self.registry.write(id, &data) {
                Ok(()) => json_ok(seq, true),
                Err(e) => registry_error(seq, e),
            },
            Request::SessionsResize { id, cols, rows } => {
                match self.registry.resize(id, cols, rows) {
                    Ok(()) => json_ok(seq, true),
                    Err(e) => registry_error(seq, e),
                }
            }
            Request::PinsGet => self.with_db(seq, |conn| hatch_db::pins::list(conn)),
            Request::PinsAdd { path } => self.with_db(seq, |conn| {
                hatch_db::pins::add(conn, &path)?;
                hatch_db::pins::list(conn)
            }),
            Request::PinsRemove { path } => self.with_db(seq, |conn| {
                hatch_db::pins::remove(conn, &path)?;
                hatch_db::pins::list(conn)
            }),
            Request::ModesGet { path } => self.with_db(seq, |conn| {
                let dangerous = hatch_db::modes::get(conn, &path)?;
                Ok(serde_json::json!({ "dangerousMode": dangerous }))
            }),
            Request::ModesSet {
                path,
                dangerous_mode,
            } => self.with_db(seq, |conn| {
                hatch_db::modes::set(conn, &path, dangerous_mode)?;
                Ok(serde_json::json!({ "dangerousMode": dangerous_mode }))
            }),
            Request::HomeDir => match collab::home_dir() {
                Some(home) => json_ok(seq, home.to_string_lossy()),
                None => Reply::error(
                    seq,
                    ErrorKind::TransportFailure,
                    "home directory unavailable",
                ),
            },
            Request::DialogSelectDirectory => {
                let picked = self
                    .picker
                    .pick_directory()
                    .map(|p| p.to_string_lossy().into_owned());
                json_ok(seq, picked)
            }
            Request::EditorOpen { path } => json_ok(seq, collab::open_in_editor(Path::new(&path))),
        }
    }

    fn with_db<T: Serialize>(
        &self,
        seq: Option<u64>,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Reply {
        let conn = match self.db.lock() {
            Ok(conn) => conn,
            Err(_) => {
                return Reply::error(seq, ErrorKind::TransportFailure, "database lock poisoned")
            }
        };
        match f(&conn) {
            Ok(value) => json_ok(seq, value),
            Err(e) => Reply::error(seq, ErrorKind::TransportFailure, e.to_string()),
        }
    }
}

fn json_ok<T: Serialize>(seq: Option<u64>, value: T) -> Reply {
    match serde_json::to_value(value) {
        Ok(v) => Reply::ok(seq, v),
        Err(e) => Reply::error(seq, ErrorKind::TransportFailure, e.to_string()),
    }
}

fn registry_error(seq: Option<u64>, err: RegistryError) -> Reply {
    let kind = match err {
        RegistryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        RegistryError::NotFound(_) => ErrorKind::NotFound,
        RegistryError::SpawnFailure(_) => ErrorKind::SpawnFailure,
        RegistryError::Io(_) => ErrorKind::TransportFailure,
    };
    Reply::error(seq, kind, err.to_string())
}
