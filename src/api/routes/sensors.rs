//! Sensor Routes
//!
//! Endpoints for readings of a single sensor.
//!
//! - GET /sensors/:sensor_id/data - All readings, ascending (optional `startDate`)
//! - GET /sensors/:sensor_id/latest - Latest reading (`format=json|arduino`)
//! - PUT /sensors/:sensor_id/data - Store a reading (dedup applied)

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{DataParams, LatestParams, PutReadingRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::run_blocking;
use crate::api::state::AppState;
use crate::query::{LatestFormat, LatestPayload, ReadingRecord};

/// GET /sensors/:sensor_id/data
///
/// Readings in ascending timestamp order. An unknown sensor yields `[]`.
pub async fn get_sensor_data(
    State(state): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
    Query(params): Query<DataParams>,
) -> ApiResult<Json<Vec<ReadingRecord>>> {
    let queries = Arc::clone(&state.queries);
    let records =
        run_blocking(move || queries.range(&sensor_id, params.start_date.as_deref())).await?;

    Ok(Json(records))
}

/// GET /sensors/:sensor_id/latest
///
/// JSON object by default, `{}` when the sensor has no readings.
/// `format=arduino` answers `text/plain` `T<temperature>;H<humidity>`.
pub async fn get_latest_sensor_data(
    State(state): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
    Query(params): Query<LatestParams>,
) -> ApiResult<Response> {
    let format: LatestFormat = params
        .format
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(ApiError::Validation)?;

    let queries = Arc::clone(&state.queries);
    let payload = run_blocking(move || queries.latest_encoded(&sensor_id, format)).await?;

    Ok(match payload {
        LatestPayload::Json(Some(record)) => Json(record).into_response(),
        LatestPayload::Json(None) => Json(serde_json::json!({})).into_response(),
        LatestPayload::Text(line) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            line,
        )
            .into_response(),
    })
}

/// PUT /sensors/:sensor_id/data
///
/// Rounds, dedups and stores the reading before answering 204.
pub async fn put_sensor_data(
    State(state): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
    payload: Result<Json<PutReadingRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    let ingestor = Arc::clone(&state.ingestor);
    run_blocking(move || ingestor.ingest(&sensor_id, req.temperature, req.humidity)).await?;

    Ok(StatusCode::NO_CONTENT)
}
