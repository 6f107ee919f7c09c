//! # Sensor Server
//!
//! Collects temperature/humidity readings and discrete events from networked
//! sensors, stores them durably in SQLite and serves them back over HTTP.
//!
//! ## Features
//!
//! - **Compaction on write**: runs of identical readings collapse to their
//!   first and latest sample
//! - **State transitions only**: repeated events of the same type are dropped
//! - **Two encodings**: JSON records and a compact line for microcontrollers
//! - **Durability**: WAL journal with full sync, acknowledged after commit
//!
//! ## Modules
//!
//! - [`storage`]: SQLite storage engine for readings and events
//! - [`ingest`]: Dedup policy and event state tracker
//! - [`query`]: Range, latest and event queries with their encodings
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensorserver::ingest::{DedupConfig, ReadingIngestor};
//! use sensorserver::query::{LatestFormat, LatestPayload, QueryService};
//! use sensorserver::storage::{StorageConfig, StorageEngine};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(StorageEngine::open(StorageConfig::new("./data"))?);
//!     let dedup = DedupConfig::default();
//!
//!     let ingestor = ReadingIngestor::new(Arc::clone(&storage), dedup);
//!     ingestor.ingest("indoor", 21.54, 47.2)?;
//!
//!     let queries = QueryService::new(Arc::clone(&storage), dedup.humidity_precision);
//!     if let LatestPayload::Text(line) = queries.latest_encoded("indoor", LatestFormat::Arduino)? {
//!         println!("{}", line); // T21.5;H47
//!     }
//!
//!     storage.close()?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod query;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    Event, EventStore, Reading, ReadingStore, StorageConfig, StorageEngine, StorageError,
    StorageResult, StorageStats,
};

pub use error::{SensorError, SensorResult};

pub use ingest::{
    ConsistencyMode, DedupConfig, DedupOutcome, EventOutcome, EventTracker, HumidityPrecision,
    ReadingIngestor,
};

pub use query::{EventRecord, LatestFormat, LatestPayload, QueryService, ReadingRecord};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, ConfigSource, LoggingConfig};
