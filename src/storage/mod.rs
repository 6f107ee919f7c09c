//! Sensor Storage Engine
//!
//! This module provides durable storage for readings and events:
//!
//! - **types**: Core data structures (Reading, Event)
//! - **schema**: SQLite tables, indexes and pragmas
//! - **store**: The `ReadingStore` / `EventStore` CRUD seams and their SQL
//! - **engine**: The shared engine object and its transaction scope
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   insert_reading → lock connection → INSERT → WAL commit (fsync)
//!
//! Read Path:
//!   list/latest → lock connection → (sensor_id, timestamp) index scan
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sensorserver::storage::{ReadingStore, StorageConfig, StorageEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StorageEngine::open(StorageConfig::new("./data"))?;
//!
//!     engine.insert_reading("indoor", 21.5, 47.0)?;
//!     let latest = engine.latest_reading("indoor")?;
//!     println!("{:?}", latest);
//!
//!     engine.close()?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod schema;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use engine::{StorageConfig, StorageEngine, StorageStats, StorageTx};
pub use error::{StorageError, StorageResult};
pub use store::{EventStore, ReadingStore};
pub use types::{Event, EventId, Reading, ReadingId};
