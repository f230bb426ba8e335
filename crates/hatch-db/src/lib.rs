pub mod modes;
pub mod pins;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

pub use pins::Pin;

pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    schema::initialize(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub(crate) fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::initialize(&conn).unwrap();
    conn
}
