//! Data Transfer Objects
//!
//! Request bodies, query parameters and non-record responses. Reading and
//! event records themselves live in [`crate::query`] since they are the wire
//! contract shared with the CLI.

use serde::{Deserialize, Serialize};

// ============================================
// SENSOR DTOs
// ============================================

/// Body of `PUT /sensors/:sensor_id/data`
#[derive(Debug, Deserialize)]
pub struct PutReadingRequest {
    pub temperature: f64,
    pub humidity: f64,
}

/// Query string of `GET /sensors/:sensor_id/data`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataParams {
    /// Only readings at or after this date
    #[serde(default)]
    pub start_date: Option<String>,
}

/// Query string of `GET /sensors/:sensor_id/latest`
#[derive(Debug, Default, Deserialize)]
pub struct LatestParams {
    /// `json` (default) or `arduino`
    #[serde(default)]
    pub format: Option<String>,
}

// ============================================
// EVENT DTOs
// ============================================

/// Body of `PUT /events`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutEventRequest {
    /// Optional here so a missing field maps to a validation error
    #[serde(default)]
    pub event_type: Option<String>,
}

/// Query string of `GET /events`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParams {
    /// Comma-separated list of event types
    #[serde(default)]
    pub event_types: Option<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, unhealthy
    pub status: String,
    /// Storage status
    pub storage: String,
    /// Stored reading rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readings: Option<u64>,
    /// Distinct sensor ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensors: Option<u64>,
    /// Stored event rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<u64>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
