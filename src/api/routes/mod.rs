//! API Routes
//!
//! Route handlers organized by functionality.

pub mod events;
pub mod health;
pub mod sensors;

use crate::api::error::{ApiError, ApiResult};
use crate::error::SensorResult;

/// Run a storage-bound service call off the async worker threads
///
/// SQLite calls block; keep them on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> SensorResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Storage task failed: {}", e)))?
        .map_err(ApiError::from)
}
