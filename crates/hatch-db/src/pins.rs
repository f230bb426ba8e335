use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Most pinned directories kept; adding beyond this evicts the oldest.
pub const MAX_PINS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub path: String,
    pub pinned_at: i64,
}

/// List pins, most recently pinned first.
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Pin>> {
    let mut stmt =
        conn.prepare("SELECT path, pinned_at FROM pins ORDER BY pinned_at DESC, path")?;
    let rows = stmt.query_map([], |row| {
        Ok(Pin {
            path: row.get(0)?,
            pinned_at: row.get(1)?,
        })
    })?;
    rows.collect()
}

/// Pin a directory. Re-pinning an existing path is a no-op; once the cap is
/// reached the oldest pins are evicted to make room.
pub fn add(conn: &Connection, path: &str) -> rusqlite::Result<()> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(pinned_at), 0) + 1 FROM pins",
        [],
        |row| row.get(0),
    )?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO pins (path, pinned_at) VALUES (?1, ?2)",
        params![path, next],
    )?;
    if inserted == 0 {
        return Ok(());
    }

    conn.execute(
        "DELETE FROM pins WHERE path IN (
             SELECT path FROM pins ORDER BY pinned_at DESC, path
             LIMIT -1 OFFSET ?1
         )",
        params![MAX_PINS as i64],
    )?;
    Ok(())
}

/// Remove a pin. Returns `false` if the path was not pinned.
pub fn remove(conn: &Connection, path: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM pins WHERE path = ?1", params![path])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_in_memory;

    #[test]
    fn test_add_and_list_most_recent_first() {
        let conn = open_in_memory();
        add(&conn, "/a").unwrap();
        add(&conn, "/b").unwrap();
        add(&conn, "/c").unwrap();

        let paths: Vec<String> = list(&conn).unwrap().into_iter().map(|p| p.path).collect();
        assert_eq!(paths, vec!["/c", "/b", "/a"]);
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let conn = open_in_memory();
        add(&conn, "/a").unwrap();
        add(&conn, "/b").unwrap();
        add(&conn, "/a").unwrap();

        let paths: Vec<String> = list(&conn).unwrap().into_iter().map(|p| p.path).collect();
        // Order unchanged: /a keeps its original position.
        assert_eq!(paths, vec!["/b", "/a"]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let conn = open_in_memory();
        for i in 0..MAX_PINS + 3 {
            add(&conn, &format!("/dir{i}")).unwrap();
        }

        let pins = list(&conn).unwrap();
        assert_eq!(pins.len(), MAX_PINS);
        // The three oldest are gone.
        assert!(pins.iter().all(|p| p.path != "/dir0"));
        assert!(pins.iter().all(|p| p.path != "/dir1"));
        assert!(pins.iter().all(|p| p.path != "/dir2"));
        assert_eq!(pins[0].path, format!("/dir{}", MAX_PINS + 2));
    }

    #[test]
    fn test_remove() {
        let conn = open_in_memory();
        add(&conn, "/a").unwrap();
        assert!(remove(&conn, "/a").unwrap());
        assert!(!remove(&conn, "/a").unwrap());
        assert!(list(&conn).unwrap().is_empty());
    }
}
