//! Query Service
//!
//! Serves stored data back to clients:
//!
//! - **service**: range, latest, latest-N and event queries
//! - **encoding**: JSON records and the compact arduino text line
//!
//! # Example
//!
//! ```rust,ignore
//! use sensorserver::query::{LatestFormat, QueryService};
//!
//! let service = QueryService::new(storage, HumidityPrecision::Integer);
//! let readings = service.range("indoor", Some("2024-01-01"))?;
//! let line = service.latest_encoded("indoor", LatestFormat::Arduino)?;
//! ```

mod encoding;
mod service;

pub use encoding::{
    encode_arduino, format_timestamp, EventRecord, HumidityValue, LatestFormat, ReadingRecord,
    NO_DATA, TIMESTAMP_FORMAT,
};
pub use service::{parse_start_date, query_events, EventFilter, LatestPayload, QueryService};
