//! Query service
//!
//! Read-only access to stored readings and events. Absence of data is a
//! normal result (`None` / empty list), never an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;

use crate::error::{SensorError, SensorResult};
use crate::ingest::HumidityPrecision;
use crate::query::encoding::{encode_arduino, EventRecord, LatestFormat, ReadingRecord};
use crate::storage::{Event, EventStore, Reading, ReadingStore, StorageEngine};

/// Set of event types requested by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    types: Vec<String>,
}

impl EventFilter {
    /// Parse a comma-separated `eventTypes` parameter
    ///
    /// Missing or blank input is rejected rather than treated as "all".
    pub fn parse(raw: Option<&str>) -> SensorResult<Self> {
        let types: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if types.is_empty() {
            return Err(SensorError::InvalidInput(
                "Please provide an 'eventTypes' query parameter".to_string(),
            ));
        }

        Ok(Self { types })
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }
}

/// Parse the `startDate` parameter of the range query
///
/// Accepts `YYYY-MM-DD` (midnight UTC), `YYYY-MM-DD HH:MM:SS` (UTC) or RFC 3339.
pub fn parse_start_date(raw: &str) -> SensorResult<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    if let Some(naive) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(SensorError::InvalidInput(format!(
        "startDate '{}' is not a date (expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339)",
        raw
    )))
}

/// Filtered events, ascending; the filter is validated before `store` is touched
pub fn query_events<S: EventStore + ?Sized>(store: &S, raw: Option<&str>) -> SensorResult<Vec<Event>> {
    let filter = EventFilter::parse(raw)?;
    Ok(store.list_events(filter.types())?)
}

/// Body of a latest-reading response
#[derive(Debug, Clone, PartialEq)]
pub enum LatestPayload {
    /// JSON object, or `None` for the empty-object marker
    Json(Option<ReadingRecord>),
    /// Plain-text arduino line
    Text(String),
}

/// Read side of the sensor store
pub struct QueryService {
    storage: Arc<StorageEngine>,
    precision: HumidityPrecision,
}

impl QueryService {
    pub fn new(storage: Arc<StorageEngine>, precision: HumidityPrecision) -> Self {
        Self { storage, precision }
    }

    /// All readings for a sensor in ascending order, optionally from `start_date` on
    pub fn range(
        &self,
        sensor_id: &str,
        start_date: Option<&str>,
    ) -> SensorResult<Vec<ReadingRecord>> {
        tracing::info!(sensor_id = %sensor_id, start_date = ?start_date, "getSensorData");

        let since = start_date.map(parse_start_date).transpose()?;
        let readings = self.storage.list_readings(sensor_id, since)?;

        tracing::debug!(sensor_id = %sensor_id, rows = readings.len(), "Returning readings");
        Ok(readings
            .iter()
            .map(|r| ReadingRecord::new(r, self.precision))
            .collect())
    }

    /// The single most recent reading
    pub fn latest(&self, sensor_id: &str) -> SensorResult<Option<Reading>> {
        Ok(self.storage.latest_reading(sensor_id)?)
    }

    /// Up to `n` most recent readings, newest first
    pub fn latest_n(&self, sensor_id: &str, n: usize) -> SensorResult<Vec<Reading>> {
        Ok(self.storage.latest_n_readings(sensor_id, n)?)
    }

    /// Latest reading rendered in the requested encoding
    pub fn latest_encoded(&self, sensor_id: &str, format: LatestFormat) -> SensorResult<LatestPayload> {
        tracing::info!(sensor_id = %sensor_id, format = ?format, "getLatestSensorData");

        let latest = self.latest(sensor_id)?;
        Ok(match format {
            LatestFormat::Json => {
                LatestPayload::Json(latest.as_ref().map(|r| ReadingRecord::new(r, self.precision)))
            }
            LatestFormat::Arduino => {
                LatestPayload::Text(encode_arduino(latest.as_ref(), self.precision))
            }
        })
    }

    /// Events matching a comma-separated type list, ascending
    pub fn events(&self, event_types: Option<&str>) -> SensorResult<Vec<EventRecord>> {
        tracing::info!(event_types = ?event_types, "getEvents");

        let events = query_events(self.storage.as_ref(), event_types)?;
        Ok(events.iter().map(EventRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{DedupConfig, ReadingIngestor};
    use crate::storage::{EventId, StorageConfig, StorageResult};
    use std::cell::Cell;
    use tempfile::tempdir;

    fn create_service() -> (QueryService, Arc<StorageEngine>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(StorageEngine::open(StorageConfig::new(dir.path())).unwrap());
        let service = QueryService::new(Arc::clone(&storage), HumidityPrecision::Integer);
        (service, storage, dir)
    }

    /// Counts every storage call
    #[derive(Default)]
    struct CountingStore {
        calls: Cell<usize>,
    }

    impl EventStore for CountingStore {
        fn insert_event(&self, _event_type: &str) -> StorageResult<EventId> {
            self.calls.set(self.calls.get() + 1);
            Ok(1)
        }

        fn latest_event(&self) -> StorageResult<Option<Event>> {
            self.calls.set(self.calls.get() + 1);
            Ok(None)
        }

        fn list_events(&self, _event_types: &[String]) -> StorageResult<Vec<Event>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_event_filter_parse() {
        let filter = EventFilter::parse(Some("FLAPS_OPEN, FLAPS_CLOSE,,")).unwrap();
        assert_eq!(filter.types(), &["FLAPS_OPEN", "FLAPS_CLOSE"]);

        assert!(EventFilter::parse(None).is_err());
        assert!(EventFilter::parse(Some("")).is_err());
        assert!(EventFilter::parse(Some(" , ")).is_err());
    }

    #[test]
    fn test_missing_filter_makes_no_storage_calls() {
        let store = CountingStore::default();

        let result = query_events(&store, None);
        assert!(matches!(result, Err(SensorError::InvalidInput(_))));
        assert_eq!(store.calls.get(), 0);

        query_events(&store, Some("FLAPS_OPEN")).unwrap();
        assert_eq!(store.calls.get(), 1);
    }

    #[test]
    fn test_parse_start_date() {
        let day = parse_start_date("2014-01-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2014-01-01T00:00:00+00:00");

        let full = parse_start_date("2014-01-01 06:30:00").unwrap();
        assert_eq!(full.to_rfc3339(), "2014-01-01T06:30:00+00:00");

        let rfc = parse_start_date("2014-01-01T06:30:00+02:00").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2014-01-01T04:30:00+00:00");

        assert!(matches!(
            parse_start_date("yesterday"),
            Err(SensorError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_range_ascending() {
        let (service, storage, _dir) = create_service();

        storage.insert_reading("indoor", 20.0, 40.0).unwrap();
        storage.insert_reading("indoor", 21.0, 41.0).unwrap();
        storage.insert_reading("indoor", 22.0, 42.0).unwrap();

        let records = service.range("indoor", None).unwrap();
        let temps: Vec<f64> = records.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![20.0, 21.0, 22.0]);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        assert!(service.range("indoor", Some("2999-01-01")).unwrap().is_empty());
        assert_eq!(service.range("indoor", Some("2014-01-01")).unwrap().len(), 3);
        assert!(service.range("nowhere", None).unwrap().is_empty());
    }

    #[test]
    fn test_latest_absent() {
        let (service, _storage, _dir) = create_service();

        assert!(service.latest("indoor").unwrap().is_none());
        assert_eq!(
            service.latest_encoded("indoor", LatestFormat::Json).unwrap(),
            LatestPayload::Json(None)
        );
        assert_eq!(
            service.latest_encoded("indoor", LatestFormat::Arduino).unwrap(),
            LatestPayload::Text("NODATA".to_string())
        );
    }

    #[test]
    fn test_latest_round_trip_through_ingest() {
        let (service, storage, _dir) = create_service();
        let ingestor = ReadingIngestor::new(Arc::clone(&storage), DedupConfig::default());

        ingestor.ingest("indoor", 21.499999, 47.2).unwrap();

        match service.latest_encoded("indoor", LatestFormat::Json).unwrap() {
            LatestPayload::Json(Some(record)) => {
                let json = serde_json::to_value(&record).unwrap();
                assert_eq!(json["temperature"].to_string(), "21.5");
                assert_eq!(json["humidity"].to_string(), "47");
            }
            other => panic!("unexpected payload {:?}", other),
        }

        assert_eq!(
            service.latest_encoded("indoor", LatestFormat::Arduino).unwrap(),
            LatestPayload::Text("T21.5;H47".to_string())
        );
    }

    #[test]
    fn test_latest_n_limit() {
        let (service, storage, _dir) = create_service();

        for i in 0..4 {
            storage.insert_reading("indoor", 20.0 + i as f64, 40.0).unwrap();
        }

        let latest = service.latest_n("indoor", 3).unwrap();
        assert_eq!(latest.len(), 3);
        assert_eq!(latest[0].temperature, 23.0);
        assert_eq!(latest[2].temperature, 21.0);
    }

    #[test]
    fn test_events_query() {
        let (service, storage, _dir) = create_service();

        storage.insert_event("FLAPS_OPEN").unwrap();
        storage.insert_event("MOTION").unwrap();
        storage.insert_event("FLAPS_CLOSE").unwrap();

        let events = service.events(Some("FLAPS_OPEN,FLAPS_CLOSE")).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "FLAPS_OPEN");
        assert_eq!(events[1].event_type, "FLAPS_CLOSE");

        assert!(matches!(service.events(None), Err(SensorError::InvalidInput(_))));
    }
}
