//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::ingest::{DedupConfig, EventTracker, ReadingIngestor};
use crate::query::QueryService;
use crate::storage::StorageEngine;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Storage engine, owned by the process entry point
    pub storage: Arc<StorageEngine>,
    /// Reading ingestion with dedup compaction
    pub ingestor: Arc<ReadingIngestor>,
    /// Event ingestion with state tracking
    pub events: Arc<EventTracker>,
    /// Read side: range, latest, events
    pub queries: Arc<QueryService>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire the ingestion and query services around one storage engine
    pub fn new(storage: Arc<StorageEngine>, dedup: DedupConfig, config: ApiConfig) -> Self {
        let ingestor = Arc::new(ReadingIngestor::new(Arc::clone(&storage), dedup));
        let events = Arc::new(EventTracker::new(Arc::clone(&storage), dedup.consistency));
        let queries = Arc::new(QueryService::new(
            Arc::clone(&storage),
            dedup.humidity_precision,
        ));

        Self {
            storage,
            ingestor,
            events,
            queries,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
