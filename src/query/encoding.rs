//! Output encodings (wire contract v1)
//!
//! - JSON records: `{timestamp, temperature, humidity}` and `{timestamp, eventType}`
//! - Arduino text: `T<temperature>;H<humidity>`, e.g. `T21.5;H47`
//!
//! Timestamps render as UTC `YYYY-MM-DD HH:MM:SS.mmm`. Temperature always has
//! one fractional digit; humidity is a whole number or carries one digit,
//! depending on the configured precision.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::ingest::HumidityPrecision;
use crate::storage::{Event, Reading};

/// Timestamp layout on the wire
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Arduino-format body when a sensor has no readings
pub const NO_DATA: &str = "NODATA";

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Humidity as rendered under a given precision
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HumidityValue {
    Whole(i64),
    Decimal(f64),
}

impl HumidityValue {
    pub fn new(humidity: f64, precision: HumidityPrecision) -> Self {
        match precision {
            HumidityPrecision::Integer => {
                let whole = humidity.round();
                if whole >= i64::MIN as f64 && whole < i64::MAX as f64 {
                    HumidityValue::Whole(whole as i64)
                } else {
                    HumidityValue::Decimal(whole)
                }
            }
            HumidityPrecision::OneDecimal => HumidityValue::Decimal(precision.round(humidity)),
        }
    }
}

impl fmt::Display for HumidityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HumidityValue::Whole(v) => write!(f, "{}", v),
            HumidityValue::Decimal(v) => write!(f, "{:.1}", v),
        }
    }
}

/// One reading as served to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingRecord {
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: HumidityValue,
}

impl ReadingRecord {
    pub fn new(reading: &Reading, precision: HumidityPrecision) -> Self {
        Self {
            timestamp: format_timestamp(&reading.timestamp),
            temperature: reading.temperature,
            humidity: HumidityValue::new(reading.humidity, precision),
        }
    }
}

/// One event as served to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub timestamp: String,
    pub event_type: String,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            timestamp: format_timestamp(&event.timestamp),
            event_type: event.event_type.clone(),
        }
    }
}

/// Encoding selected by the `format` query parameter of the latest query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatestFormat {
    #[default]
    Json,
    Arduino,
}

impl FromStr for LatestFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "json" => Ok(LatestFormat::Json),
            "arduino" => Ok(LatestFormat::Arduino),
            other => Err(format!("unknown format '{}', expected json or arduino", other)),
        }
    }
}

/// Compact line for embedded clients, parsed positionally on the device
pub fn encode_arduino(reading: Option<&Reading>, precision: HumidityPrecision) -> String {
    match reading {
        Some(reading) => format!(
            "T{:.1};H{}",
            reading.temperature,
            HumidityValue::new(reading.humidity, precision)
        ),
        None => NO_DATA.to_string(),
    }
}
