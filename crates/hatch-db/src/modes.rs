use rusqlite::{params, Connection, OptionalExtension};

/// Whether sessions in `path` should launch in dangerous mode.
/// Unknown paths default to `false`.
pub fn get(conn: &Connection, path: &str) -> rusqlite::Result<bool> {
    let dangerous: Option<i64> = conn
        .query_row(
            "SELECT dangerous FROM path_modes WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(dangerous.unwrap_or(0) != 0)
}

pub fn set(conn: &Connection, path: &str, dangerous: bool) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO path_modes (path, dangerous) VALUES (?1, ?2) \
         ON CONFLICT(path) DO UPDATE SET dangerous = excluded.dangerous",
        params![path, dangerous as i64],
    )?;
    Ok(())
}
