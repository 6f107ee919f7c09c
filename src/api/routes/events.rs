//! Event Routes
//!
//! - GET /events?eventTypes=A,B - Events of the given types, ascending
//! - PUT /events - Record an event (dropped if it repeats the latest one)

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{EventParams, PutEventRequest};
use crate::api::error::ApiResult;
use crate::api::routes::run_blocking;
use crate::api::state::AppState;
use crate::query::EventRecord;

/// GET /events
///
/// A missing or blank `eventTypes` parameter is a 400; storage is not queried.
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventParams>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let queries = Arc::clone(&state.queries);
    let records = run_blocking(move || queries.events(params.event_types.as_deref())).await?;

    Ok(Json(records))
}

/// PUT /events
///
/// Answers 204 once the store-or-skip decision has been persisted.
pub async fn put_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PutEventRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    let tracker = Arc::clone(&state.events);
    let event_type = req.event_type.unwrap_or_default();
    run_blocking(move || tracker.record(&event_type)).await?;

    Ok(StatusCode::NO_CONTENT)
}
