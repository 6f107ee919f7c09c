//! Event state tracking
//!
//! Collectors report the current state repeatedly (`FLAPS_OPEN`, `FLAPS_OPEN`,
//! ...). Only transitions are stored: an incoming event is dropped when the
//! most recent stored event already has the same type, so no two adjacent
//! stored events share a type.

use std::sync::Arc;

use crate::error::{SensorError, SensorResult};
use crate::ingest::dedup::ConsistencyMode;
use crate::storage::{EventId, EventStore, StorageEngine, StorageResult};

/// What the tracker did with an incoming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// A state transition; stored under this id
    Stored(EventId),
    /// Same type as the latest stored event; nothing written
    Unchanged { current: EventId },
}

impl EventOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, EventOutcome::Stored(_))
    }
}

/// Store `event_type` unless it repeats the latest stored event
pub fn track<S: EventStore + ?Sized>(store: &S, event_type: &str) -> StorageResult<EventOutcome> {
    match store.latest_event()? {
        Some(latest) if latest.event_type == event_type => Ok(EventOutcome::Unchanged {
            current: latest.id,
        }),
        _ => Ok(EventOutcome::Stored(store.insert_event(event_type)?)),
    }
}

/// Ingestion entry point for events
pub struct EventTracker {
    storage: Arc<StorageEngine>,
    consistency: ConsistencyMode,
}

impl EventTracker {
    pub fn new(storage: Arc<StorageEngine>, consistency: ConsistencyMode) -> Self {
        Self {
            storage,
            consistency,
        }
    }

    /// Record an observed event type
    ///
    /// Persists synchronously; when this returns `Ok` the decision has been
    /// applied and a retry observes it.
    pub fn record(&self, event_type: &str) -> SensorResult<EventOutcome> {
        if event_type.trim().is_empty() {
            return Err(SensorError::InvalidInput(
                "eventType must be a non-empty string".to_string(),
            ));
        }

        tracing::info!(event_type = %event_type, "putEvent");

        let outcome = match self.consistency {
            ConsistencyMode::Relaxed => track(self.storage.as_ref(), event_type)?,
            ConsistencyMode::Serializable => {
                self.storage.transaction(|tx| track(tx, event_type))?
            }
        };

        if !outcome.is_stored() {
            tracing::info!(
                event_type = %event_type,
                "Last event in database is already of this type, nothing persisted"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;
    use tempfile::tempdir;

    fn create_tracker(consistency: ConsistencyMode) -> (EventTracker, Arc<StorageEngine>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(StorageEngine::open(StorageConfig::new(dir.path())).unwrap());
        let tracker = EventTracker::new(Arc::clone(&storage), consistency);
        (tracker, storage, dir)
    }

    fn all_types(storage: &StorageEngine) -> Vec<String> {
        storage
            .list_events(&["FLAPS_OPEN".to_string(), "FLAPS_CLOSE".to_string()])
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[test]
    fn test_first_event_stored() {
        let (tracker, storage, _dir) = create_tracker(ConsistencyMode::Relaxed);

        let outcome = tracker.record("FLAPS_OPEN").unwrap();
        assert!(outcome.is_stored());
        assert_eq!(all_types(&storage), vec!["FLAPS_OPEN"]);
    }

    #[test]
    fn test_repeated_event_keeps_first() {
        let (tracker, storage, _dir) = create_tracker(ConsistencyMode::Relaxed);

        let first = tracker.record("FLAPS_OPEN").unwrap();
        let first_ts = storage.latest_event().unwrap().unwrap().timestamp;

        for _ in 0..5 {
            let outcome = tracker.record("FLAPS_OPEN").unwrap();
            match (first, outcome) {
                (EventOutcome::Stored(id), EventOutcome::Unchanged { current }) => {
                    assert_eq!(id, current)
                }
                other => panic!("unexpected outcomes {:?}", other),
            }
        }

        let events = storage.list_events(&["FLAPS_OPEN".to_string()]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, first_ts);
    }

    #[test]
    fn test_no_adjacent_duplicates() {
        let (tracker, storage, _dir) = create_tracker(ConsistencyMode::Serializable);

        for event_type in [
            "FLAPS_OPEN",
            "FLAPS_OPEN",
            "FLAPS_CLOSE",
            "FLAPS_CLOSE",
            "FLAPS_CLOSE",
            "FLAPS_OPEN",
        ] {
            tracker.record(event_type).unwrap();
        }

        let types = all_types(&storage);
        assert_eq!(types, vec!["FLAPS_OPEN", "FLAPS_CLOSE", "FLAPS_OPEN"]);
        assert!(types.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_empty_event_type_rejected() {
        let (tracker, storage, _dir) = create_tracker(ConsistencyMode::Relaxed);

        assert!(matches!(tracker.record(""), Err(SensorError::InvalidInput(_))));
        assert!(matches!(tracker.record("   "), Err(SensorError::InvalidInput(_))));
        assert!(storage.latest_event().unwrap().is_none());
    }
}
