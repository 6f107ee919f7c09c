//! SQLite schema and connection setup
//!
//! Two tables:
//! - `data`: readings keyed by `(sensor_id, timestamp)` plus surrogate `id`
//! - `events`: events keyed by `timestamp` plus surrogate `id`
//!
//! `AUTOINCREMENT` keeps ids monotonic even after the newest row is deleted
//! by dedup compaction.

use rusqlite::Connection;
use std::time::Duration;

use crate::storage::error::StorageResult;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sensor_id TEXT NOT NULL,
        temperature REAL NOT NULL,
        humidity REAL NOT NULL,
        timestamp INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_data_sensor_timestamp ON data(sensor_id, timestamp);

    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_type TEXT NOT NULL,
        timestamp INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
    CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type, timestamp);
";

/// Apply pragmas and create tables if missing
///
/// `synchronous = FULL` in WAL mode makes every committed write durable
/// before the call returns.
pub fn initialize(conn: &Connection, busy_timeout: Duration) -> StorageResult<()> {
    conn.busy_timeout(busy_timeout)?;

    // journal_mode returns a row, so it can't go through execute_batch
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    tracing::debug!(journal_mode = %mode, "SQLite journal mode set");

    conn.execute_batch(
        "
        PRAGMA synchronous = FULL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
        ",
    )?;

    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Highest timestamp already handed out, across both tables
pub fn max_timestamp(conn: &Connection) -> StorageResult<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(ts) FROM (
            SELECT MAX(timestamp) AS ts FROM data
            UNION ALL
            SELECT MAX(timestamp) AS ts FROM events
        )",
        [],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn, Duration::from_millis(100)).unwrap();
        initialize(&conn, Duration::from_millis(100)).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('data', 'events')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_max_timestamp_empty() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn, Duration::from_millis(100)).unwrap();
        assert_eq!(max_timestamp(&conn).unwrap(), 0);
    }

    #[test]
    fn test_max_timestamp_spans_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn, Duration::from_millis(100)).unwrap();

        conn.execute(
            "INSERT INTO data (sensor_id, temperature, humidity, timestamp) VALUES ('a', 1.0, 2.0, 500)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO events (event_type, timestamp) VALUES ('FLAPS_OPEN', 900)",
            [],
        )
        .unwrap();

        assert_eq!(max_timestamp(&conn).unwrap(), 900);
    }
}
