//! Health Routes
//!
//! Health check endpoints for monitoring.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (database answers)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::routes::run_blocking;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 if the database answers a trivial query.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    let storage = Arc::clone(&state.storage);
    match run_blocking(move || Ok(storage.ping()?)).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /health
///
/// Full health status with row counts.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage = Arc::clone(&state.storage);
    let stats = run_blocking(move || Ok(storage.stats()?)).await;

    let response = match stats {
        Ok(stats) => HealthResponse {
            status: "healthy".to_string(),
            storage: "ok".to_string(),
            readings: Some(stats.reading_count),
            sensors: Some(stats.sensor_count),
            events: Some(stats.event_count),
            uptime_seconds: state.uptime_seconds(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read storage stats");
            HealthResponse {
                status: "unhealthy".to_string(),
                storage: "error".to_string(),
                readings: None,
                sensors: None,
                events: None,
                uptime_seconds: state.uptime_seconds(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            }
        }
    };

    Json(response)
}
