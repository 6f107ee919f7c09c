//! Storage primitives
//!
//! [`ReadingStore`] and [`EventStore`] are the CRUD seams the ingestion and
//! query layers program against. They are implemented by
//! [`StorageEngine`](crate::storage::StorageEngine) (one lock per call) and by
//! [`StorageTx`](crate::storage::StorageTx) (every call inside one SQLite
//! transaction). The SQL lives here once and runs against either a plain
//! connection or a transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::storage::error::StorageResult;
use crate::storage::types::{timestamp_from_millis, Event, EventId, Reading, ReadingId};

/// CRUD over the readings table
pub trait ReadingStore {
    /// Append a reading stamped with the current time
    fn insert_reading(&self, sensor_id: &str, temperature: f64, humidity: f64)
        -> StorageResult<ReadingId>;

    /// Delete exactly one reading. Returns `false` if the row was already gone.
    fn delete_reading(&self, id: ReadingId) -> StorageResult<bool>;

    /// All readings for a sensor, ascending by timestamp, optionally from `since` on
    fn list_readings(
        &self,
        sensor_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Reading>>;

    /// Up to `n` most recent readings, descending by timestamp
    fn latest_n_readings(&self, sensor_id: &str, n: usize) -> StorageResult<Vec<Reading>>;

    /// The most recent reading, or `None` when the sensor has no rows
    fn latest_reading(&self, sensor_id: &str) -> StorageResult<Option<Reading>> {
        Ok(self.latest_n_readings(sensor_id, 1)?.into_iter().next())
    }
}

/// CRUD over the events table
pub trait EventStore {
    /// Append an event stamped with the current time
    fn insert_event(&self, event_type: &str) -> StorageResult<EventId>;

    /// The most recent event of any type
    fn latest_event(&self) -> StorageResult<Option<Event>>;

    /// Events whose type is in `event_types`, ascending by timestamp
    fn list_events(&self, event_types: &[String]) -> StorageResult<Vec<Event>>;
}

struct ReadingRow {
    id: i64,
    sensor_id: String,
    temperature: f64,
    humidity: f64,
    timestamp: i64,
}

impl ReadingRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sensor_id: row.get(1)?,
            temperature: row.get(2)?,
            humidity: row.get(3)?,
            timestamp: row.get(4)?,
        })
    }

    fn into_reading(self) -> StorageResult<Reading> {
        Ok(Reading {
            id: self.id,
            sensor_id: self.sensor_id,
            temperature: self.temperature,
            humidity: self.humidity,
            timestamp: timestamp_from_millis(self.timestamp)?,
        })
    }
}

struct EventRow {
    id: i64,
    event_type: String,
    timestamp: i64,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            event_type: row.get(1)?,
            timestamp: row.get(2)?,
        })
    }

    fn into_event(self) -> StorageResult<Event> {
        Ok(Event {
            id: self.id,
            event_type: self.event_type,
            timestamp: timestamp_from_millis(self.timestamp)?,
        })
    }
}

pub(crate) fn insert_reading(
    conn: &Connection,
    timestamp: i64,
    sensor_id: &str,
    temperature: f64,
    humidity: f64,
) -> StorageResult<ReadingId> {
    conn.prepare_cached(
        "INSERT INTO data (sensor_id, temperature, humidity, timestamp) VALUES (?, ?, ?, ?)",
    )?
    .execute(params![sensor_id, temperature, humidity, timestamp])?;

    let id = conn.last_insert_rowid();
    tracing::debug!(
        sensor_id = %sensor_id,
        id,
        temperature,
        humidity,
        "Persisted reading"
    );
    Ok(id)
}

pub(crate) fn delete_reading(conn: &Connection, id: ReadingId) -> StorageResult<bool> {
    let removed = conn
        .prepare_cached("DELETE FROM data WHERE id = ?")?
        .execute(params![id])?;

    tracing::debug!(id, removed, "Deleted reading");
    Ok(removed > 0)
}

pub(crate) fn list_readings(
    conn: &Connection,
    sensor_id: &str,
    since: Option<DateTime<Utc>>,
) -> StorageResult<Vec<Reading>> {
    let since_ms = since.map(|ts| ts.timestamp_millis()).unwrap_or(i64::MIN);

    let mut stmt = conn.prepare_cached(
        "SELECT id, sensor_id, temperature, humidity, timestamp FROM data
         WHERE sensor_id = ? AND timestamp >= ?
         ORDER BY timestamp ASC, id ASC",
    )?;

    let rows = stmt
        .query_map(params![sensor_id, since_ms], ReadingRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(ReadingRow::into_reading).collect()
}

pub(crate) fn latest_n_readings(
    conn: &Connection,
    sensor_id: &str,
    n: usize,
) -> StorageResult<Vec<Reading>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let limit = i64::try_from(n).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare_cached(
        "SELECT id, sensor_id, temperature, humidity, timestamp FROM data
         WHERE sensor_id = ?
         ORDER BY timestamp DESC, id DESC
         LIMIT ?",
    )?;

    let rows = stmt
        .query_map(params![sensor_id, limit], ReadingRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(ReadingRow::into_reading).collect()
}

pub(crate) fn insert_event(
    conn: &Connection,
    timestamp: i64,
    event_type: &str,
) -> StorageResult<EventId> {
    conn.prepare_cached("INSERT INTO events (event_type, timestamp) VALUES (?, ?)")?
        .execute(params![event_type, timestamp])?;

    let id = conn.last_insert_rowid();
    tracing::debug!(event_type = %event_type, id, "Persisted event");
    Ok(id)
}

pub(crate) fn latest_event(conn: &Connection) -> StorageResult<Option<Event>> {
    let row = conn
        .prepare_cached(
            "SELECT id, event_type, timestamp FROM events
             ORDER BY timestamp DESC, id DESC
             LIMIT 1",
        )?
        .query_row([], EventRow::from_row)
        .optional()?;

    row.map(EventRow::into_event).transpose()
}

pub(crate) fn list_events(conn: &Connection, event_types: &[String]) -> StorageResult<Vec<Event>> {
    if event_types.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; event_types.len()].join(", ");
    let sql = format!(
        "SELECT id, event_type, timestamp FROM events
         WHERE event_type IN ({})
         ORDER BY timestamp ASC, id ASC",
        placeholders
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(event_types.iter()), EventRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(EventRow::into_event).collect()
}
