//! Sensor Storage Engine
//!
//! Owns the SQLite database holding the `data` and `events` tables.
//!
//! - Write path: `insert_*` → prepared statement → WAL commit (fsync)
//! - Read path: indexed `(sensor_id, timestamp)` scans
//!
//! The engine is a process-wide shared resource: construct it once at
//! startup, hand out `Arc<StorageEngine>`, call [`StorageEngine::close`] at
//! shutdown. The connection sits behind a `std::sync::Mutex` because
//! `rusqlite::Connection` is `!Sync`; each [`ReadingStore`]/[`EventStore`]
//! call takes the lock for that call only. Callers that need several calls to
//! be atomic use [`StorageEngine::transaction`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema;
use crate::storage::store::{self, EventStore, ReadingStore};
use crate::storage::types::{Event, EventId, Reading, ReadingId};

/// Configuration for the storage engine
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the database file
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`
    pub database_file: String,
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("sensorserver_data"),
            database_file: "sensors.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Point the engine at an explicit database file
    pub fn from_database_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let data_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let database_file = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "sensors.db".to_string());

        Self {
            data_dir,
            database_file,
            ..Default::default()
        }
    }

    /// Full path to the database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// `database_file` must name a file directly inside `data_dir`
    pub fn validate(&self) -> StorageResult<()> {
        let file = self.database_file.trim();
        if file.is_empty() {
            return Err(StorageError::Config("database file name is empty".to_string()));
        }
        if file.contains(['/', '\\']) || file == "." || file == ".." {
            return Err(StorageError::Config(format!(
                "database file '{}' must be a plain file name",
                self.database_file
            )));
        }
        Ok(())
    }
}

/// Hands out insertion timestamps that never go backwards
///
/// Seeded from the highest stored timestamp so a wall clock stepping back
/// (NTP, RTC reset on a collector host) can't reorder rows.
#[derive(Debug)]
struct MonotonicClock {
    floor: AtomicI64,
}

impl MonotonicClock {
    fn new(floor: i64) -> Self {
        Self {
            floor: AtomicI64::new(floor),
        }
    }

    fn stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.floor.fetch_max(now, Ordering::SeqCst);
        now.max(previous)
    }
}

/// The sensor storage engine
pub struct StorageEngine {
    config: StorageConfig,
    conn: Mutex<Connection>,
    clock: MonotonicClock,
}

impl StorageEngine {
    /// Open (or create) the database described by `config`
    pub fn open(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let path = config.database_path();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        schema::initialize(&conn, Duration::from_millis(config.busy_timeout_ms))?;
        let floor = schema::max_timestamp(&conn)?;

        tracing::info!(path = ?path, "Opened sensor database");

        Ok(Self {
            config,
            conn: Mutex::new(conn),
            clock: MonotonicClock::new(floor),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire connection lock: {}", e)))
    }

    /// Run `f` inside a single `BEGIN IMMEDIATE` transaction
    ///
    /// The connection lock is held for the whole closure, so no other call on
    /// this engine interleaves. Commits if `f` returns `Ok`, rolls back
    /// otherwise.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&StorageTx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let scoped = StorageTx {
            tx,
            clock: &self.clock,
        };
        let out = f(&scoped)?;
        scoped.tx.commit().map_err(StorageError::from)?;
        Ok(out)
    }

    /// Cheap liveness query used by the readiness probe
    pub fn ping(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> StorageResult<StorageStats> {
        let conn = self.lock()?;
        let (reading_count, sensor_count): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT sensor_id) FROM data",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let event_count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;

        Ok(StorageStats {
            reading_count: reading_count as u64,
            event_count: event_count as u64,
            sensor_count: sensor_count as u64,
        })
    }

    /// Flush the WAL into the main database file
    pub fn close(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        tracing::info!(path = ?self.config.database_path(), "Sensor database checkpointed");
        Ok(())
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.config.database_path()
    }
}

impl ReadingStore for StorageEngine {
    fn insert_reading(
        &self,
        sensor_id: &str,
        temperature: f64,
        humidity: f64,
    ) -> StorageResult<ReadingId> {
        let conn = self.lock()?;
        store::insert_reading(&conn, self.clock.stamp(), sensor_id, temperature, humidity)
    }

    fn delete_reading(&self, id: ReadingId) -> StorageResult<bool> {
        let conn = self.lock()?;
        store::delete_reading(&conn, id)
    }

    fn list_readings(
        &self,
        sensor_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Reading>> {
        let conn = self.lock()?;
        store::list_readings(&conn, sensor_id, since)
    }

    fn latest_n_readings(&self, sensor_id: &str, n: usize) -> StorageResult<Vec<Reading>> {
        let conn = self.lock()?;
        store::latest_n_readings(&conn, sensor_id, n)
    }
}

impl EventStore for StorageEngine {
    fn insert_event(&self, event_type: &str) -> StorageResult<EventId> {
        let conn = self.lock()?;
        store::insert_event(&conn, self.clock.stamp(), event_type)
    }

    fn latest_event(&self) -> StorageResult<Option<Event>> {
        let conn = self.lock()?;
        store::latest_event(&conn)
    }

    fn list_events(&self, event_types: &[String]) -> StorageResult<Vec<Event>> {
        let conn = self.lock()?;
        store::list_events(&conn, event_types)
    }
}

/// Storage calls scoped to one open transaction
///
/// Obtained from [`StorageEngine::transaction`]; implements the same store
/// traits so the dedup and event logic run unchanged in either mode.
pub struct StorageTx<'a> {
    tx: Transaction<'a>,
    clock: &'a MonotonicClock,
}

impl ReadingStore for StorageTx<'_> {
    fn insert_reading(
        &self,
        sensor_id: &str,
        temperature: f64,
        humidity: f64,
    ) -> StorageResult<ReadingId> {
        store::insert_reading(&self.tx, self.clock.stamp(), sensor_id, temperature, humidity)
    }

    fn delete_reading(&self, id: ReadingId) -> StorageResult<bool> {
        store::delete_reading(&self.tx, id)
    }

    fn list_readings(
        &self,
        sensor_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<Reading>> {
        store::list_readings(&self.tx, sensor_id, since)
    }

    fn latest_n_readings(&self, sensor_id: &str, n: usize) -> StorageResult<Vec<Reading>> {
        store::latest_n_readings(&self.tx, sensor_id, n)
    }
}

impl EventStore for StorageTx<'_> {
    fn insert_event(&self, event_type: &str) -> StorageResult<EventId> {
        store::insert_event(&self.tx, self.clock.stamp(), event_type)
    }

    fn latest_event(&self) -> StorageResult<Option<Event>> {
        store::latest_event(&self.tx)
    }

    fn list_events(&self, event_types: &[String]) -> StorageResult<Vec<Event>> {
        store::list_events(&self.tx, event_types)
    }
}

/// Storage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub reading_count: u64,
    pub event_count: u64,
    pub sensor_count: u64,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Readings: {}, Sensors: {}, Events: {}",
            self.reading_count, self.sensor_count, self.event_count
        )
    }
}
