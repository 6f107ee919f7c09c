//! Core data types for the sensor store
//!
//! - `Reading`: one temperature/humidity observation for a sensor
//! - `Event`: a discrete named state change (e.g. `FLAPS_OPEN`)
//!
//! Both carry an engine-assigned surrogate id and an engine-assigned UTC
//! timestamp. Timestamps are persisted as Unix epoch milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};

/// Surrogate key of a stored reading. Monotonic, never reused.
pub type ReadingId = i64;

/// Surrogate key of a stored event. Monotonic, never reused.
pub type EventId = i64;

/// A single stored sensor observation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub id: ReadingId,
    pub sensor_id: String,
    /// Degrees Celsius, already rounded to one fractional digit by ingestion
    pub temperature: f64,
    /// Relative humidity in percent, rounded per the configured precision
    pub humidity: f64,
    pub timestamp: DateTime<Utc>,
}

/// A single stored state-change event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
}

/// Convert stored epoch milliseconds back into a UTC timestamp
pub(crate) fn timestamp_from_millis(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        StorageError::Corruption(format!("timestamp {} is out of range", millis))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let ts = timestamp_from_millis(1_700_000_000_123).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_timestamp_out_of_range() {
        let err = timestamp_from_millis(i64::MAX).unwrap_err();
        assert!(matches!(err, StorageError::Corruption(_)));
    }
}
