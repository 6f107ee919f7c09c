//! Service error types
//!
//! Error conditions shared by the ingestion and query services. "No data" is
//! not an error here: absent readings and events come back as `None`.

use thiserror::Error;

/// Errors that can occur while ingesting or querying sensor data
#[derive(Error, Debug)]
pub enum SensorError {
    /// A required field or parameter is missing or unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for service operations
pub type SensorResult<T> = Result<T, SensorError>;
