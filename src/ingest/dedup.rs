//! Reading deduplication
//!
//! Idle sensors report the same values over and over. Before a reading is
//! stored, the two most recent rows for the sensor are fetched; when both
//! equal the incoming (rounded) values, the newer of the two is deleted and
//! the new reading is appended. A run of identical readings therefore
//! collapses to two rows: the first of the run ("constant since") and the
//! latest.
//!
//! ```text
//! stored:   A  B  B          incoming: B
//! result:   A  B  B'         (middle B deleted, B' appended)
//! ```
//!
//! In [`ConsistencyMode::Relaxed`] the fetch, delete and insert are separate
//! storage calls and may interleave with other writers of the same sensor.
//! The worst case is a missed compaction (one extra row) or a reader seeing a
//! row vanish that was a duplicate of its neighbour. [`ConsistencyMode::Serializable`]
//! runs the sequence in one immediate transaction instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{SensorError, SensorResult};
use crate::storage::{Reading, ReadingId, ReadingStore, StorageEngine, StorageResult};

/// Number of stored readings inspected before each insert
pub const DEDUP_WINDOW: usize = 2;

/// Fractional digits kept for temperature
pub const TEMPERATURE_DIGITS: u32 = 1;

/// Stored values never carry more than one fractional digit, so comparing
/// values rounded to that scale is exact regardless of the humidity policy in
/// force when a row was written.
const COMPARE_DIGITS: u32 = 1;

/// How humidity is rounded before comparison and storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumidityPrecision {
    /// Nearest whole percent (`47`)
    #[default]
    Integer,
    /// One fractional digit (`46.7`)
    OneDecimal,
}

impl HumidityPrecision {
    /// Number of fractional digits kept
    pub fn digits(self) -> u32 {
        match self {
            HumidityPrecision::Integer => 0,
            HumidityPrecision::OneDecimal => 1,
        }
    }

    /// Round a raw humidity value
    pub fn round(self, humidity: f64) -> f64 {
        round_to(humidity, self.digits())
    }
}

impl fmt::Display for HumidityPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HumidityPrecision::Integer => write!(f, "integer"),
            HumidityPrecision::OneDecimal => write!(f, "one_decimal"),
        }
    }
}

impl FromStr for HumidityPrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "integer" | "int" | "0" => Ok(HumidityPrecision::Integer),
            "one_decimal" | "decimal" | "1" => Ok(HumidityPrecision::OneDecimal),
            other => Err(format!("unknown humidity precision '{}'", other)),
        }
    }
}

/// Whether the dedup read-then-write sequence runs in a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Separate storage calls; concurrent writers may race
    #[default]
    Relaxed,
    /// One `BEGIN IMMEDIATE` transaction per ingest
    Serializable,
}

impl fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyMode::Relaxed => write!(f, "relaxed"),
            ConsistencyMode::Serializable => write!(f, "serializable"),
        }
    }
}

impl FromStr for ConsistencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relaxed" => Ok(ConsistencyMode::Relaxed),
            "serializable" => Ok(ConsistencyMode::Serializable),
            other => Err(format!("unknown consistency mode '{}'", other)),
        }
    }
}

/// Dedup policy settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupConfig {
    pub humidity_precision: HumidityPrecision,
    pub consistency: ConsistencyMode,
}

/// Magnitude from which every f64 is already a whole number
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53

/// Round half away from zero to `digits` fractional digits
///
/// Values too large to carry that many digits come back unchanged.
fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    let scaled = value * scale;
    if !scaled.is_finite() || scaled.abs() >= EXACT_INTEGER_LIMIT {
        return value;
    }
    scaled.round() / scale
}

/// A temperature/humidity pair after rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    temperature: f64,
    humidity: f64,
}

impl Measurement {
    /// Round raw sensor values: temperature to one digit, humidity per `precision`
    pub fn rounded(temperature: f64, humidity: f64, precision: HumidityPrecision) -> Self {
        Self {
            temperature: round_to(temperature, TEMPERATURE_DIGITS),
            humidity: precision.round(humidity),
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Exact comparison against a stored reading
    pub fn matches(&self, reading: &Reading) -> bool {
        round_to(self.temperature, COMPARE_DIGITS) == round_to(reading.temperature, COMPARE_DIGITS)
            && round_to(self.humidity, COMPARE_DIGITS)
                == round_to(reading.humidity, COMPARE_DIGITS)
    }
}

/// What the dedup policy did with a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// Appended without touching existing rows
    Inserted { id: ReadingId },
    /// The newest stored duplicate was removed, then the reading appended
    Compacted { removed: ReadingId, id: ReadingId },
}

impl DedupOutcome {
    /// Id of the newly stored reading
    pub fn id(&self) -> ReadingId {
        match self {
            DedupOutcome::Inserted { id } | DedupOutcome::Compacted { id, .. } => *id,
        }
    }

    pub fn is_compacted(&self) -> bool {
        matches!(self, DedupOutcome::Compacted { .. })
    }
}

/// Reconcile one rounded measurement with what `store` already holds
///
/// Always inserts. Deletes the newest stored row first when it and the row
/// before it both equal `measurement`. A delete target that is already gone
/// is not an error.
pub fn reconcile<S: ReadingStore + ?Sized>(
    store: &S,
    sensor_id: &str,
    measurement: Measurement,
) -> StorageResult<DedupOutcome> {
    let recent = store.latest_n_readings(sensor_id, DEDUP_WINDOW)?;

    let removed = match recent.as_slice() {
        [newest, previous] if measurement.matches(newest) && measurement.matches(previous) => {
            if !store.delete_reading(newest.id)? {
                tracing::debug!(
                    sensor_id = %sensor_id,
                    id = newest.id,
                    "Duplicate reading already removed by another writer"
                );
            }
            Some(newest.id)
        }
        _ => None,
    };

    let id = store.insert_reading(sensor_id, measurement.temperature, measurement.humidity)?;

    Ok(match removed {
        Some(removed) => DedupOutcome::Compacted { removed, id },
        None => DedupOutcome::Inserted { id },
    })
}

/// Ingestion entry point for readings
pub struct ReadingIngestor {
    storage: Arc<StorageEngine>,
    config: DedupConfig,
}

impl ReadingIngestor {
    pub fn new(storage: Arc<StorageEngine>, config: DedupConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> DedupConfig {
        self.config
    }

    /// Round, dedup and store one reading
    pub fn ingest(
        &self,
        sensor_id: &str,
        temperature: f64,
        humidity: f64,
    ) -> SensorResult<DedupOutcome> {
        validate_reading(sensor_id, temperature, humidity)?;

        let measurement =
            Measurement::rounded(temperature, humidity, self.config.humidity_precision);

        tracing::info!(
            sensor_id = %sensor_id,
            temperature = measurement.temperature,
            humidity = measurement.humidity,
            "putSensorData"
        );

        let outcome = match self.config.consistency {
            ConsistencyMode::Relaxed => reconcile(self.storage.as_ref(), sensor_id, measurement)?,
            ConsistencyMode::Serializable => self
                .storage
                .transaction(|tx| reconcile(tx, sensor_id, measurement))?,
        };

        if let DedupOutcome::Compacted { removed, id } = outcome {
            tracing::debug!(
                sensor_id = %sensor_id,
                removed,
                id,
                "Compacted run of identical readings"
            );
        }

        Ok(outcome)
    }
}

fn validate_reading(sensor_id: &str, temperature: f64, humidity: f64) -> SensorResult<()> {
    if sensor_id.trim().is_empty() {
        return Err(SensorError::InvalidInput(
            "sensor id cannot be empty".to_string(),
        ));
    }

    if !temperature.is_finite() || !humidity.is_finite() {
        return Err(SensorError::InvalidInput(
            "temperature and humidity must be finite numbers".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;
    use tempfile::tempdir;

    fn create_ingestor(config: DedupConfig) -> (ReadingIngestor, Arc<StorageEngine>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(StorageEngine::open(StorageConfig::new(dir.path())).unwrap());
        let ingestor = ReadingIngestor::new(Arc::clone(&storage), config);
        (ingestor, storage, dir)
    }

    fn stored(storage: &StorageEngine, sensor_id: &str) -> Vec<(f64, f64)> {
        storage
            .list_readings(sensor_id, None)
            .unwrap()
            .into_iter()
            .map(|r| (r.temperature, r.humidity))
            .collect()
    }

    #[test]
    fn test_rounding() {
        let m = Measurement::rounded(21.499999, 46.6, HumidityPrecision::Integer);
        assert_eq!(m.temperature(), 21.5);
        assert_eq!(m.humidity(), 47.0);

        let m = Measurement::rounded(21.44, 46.66, HumidityPrecision::OneDecimal);
        assert_eq!(m.temperature(), 21.4);
        assert_eq!(m.humidity(), 46.7);
    }

    #[test]
    fn test_precision_parsing() {
        assert_eq!("integer".parse::<HumidityPrecision>().unwrap(), HumidityPrecision::Integer);
        assert_eq!(
            "ONE_DECIMAL".parse::<HumidityPrecision>().unwrap(),
            HumidityPrecision::OneDecimal
        );
        assert!("tenths".parse::<HumidityPrecision>().is_err());

        assert_eq!(
            "serializable".parse::<ConsistencyMode>().unwrap(),
            ConsistencyMode::Serializable
        );
        assert!("strict".parse::<ConsistencyMode>().is_err());
    }

    #[test]
    fn test_first_reading_always_inserted() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        let outcome = ingestor.ingest("indoor", 20.0, 40.0).unwrap();
        assert!(!outcome.is_compacted());
        assert_eq!(stored(&storage, "indoor"), vec![(20.0, 40.0)]);
    }

    #[test]
    fn test_single_prior_duplicate_not_compacted() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        ingestor.ingest("indoor", 20.0, 40.0).unwrap();
        let outcome = ingestor.ingest("indoor", 20.0, 40.0).unwrap();

        assert!(!outcome.is_compacted());
        assert_eq!(stored(&storage, "indoor").len(), 2);
    }

    #[test]
    fn test_three_identical_readings_keep_two() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        storage.insert_reading("indoor", 18.0, 35.0).unwrap();
        let baseline = stored(&storage, "indoor").len();

        let first = ingestor.ingest("indoor", 20.0, 40.0).unwrap();
        let second = ingestor.ingest("indoor", 20.0, 40.0).unwrap();
        let third = ingestor.ingest("indoor", 20.0, 40.0).unwrap();

        assert_eq!(
            third,
            DedupOutcome::Compacted {
                removed: second.id(),
                id: third.id()
            }
        );

        let rows = storage.list_readings("indoor", None).unwrap();
        assert_eq!(rows.len(), baseline + 2);
        assert_eq!(rows[rows.len() - 2].id, first.id());
        assert_eq!(rows[rows.len() - 1].id, third.id());

        let latest = storage.latest_reading("indoor").unwrap().unwrap();
        assert_eq!((latest.temperature, latest.humidity), (20.0, 40.0));
    }

    #[test]
    fn test_long_run_bounded() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        ingestor.ingest("indoor", 19.0, 30.0).unwrap();
        let baseline = stored(&storage, "indoor").len();

        for _ in 0..50 {
            ingestor.ingest("indoor", 20.0, 40.0).unwrap();
            assert!(stored(&storage, "indoor").len() <= baseline + 2);
        }
        assert_eq!(stored(&storage, "indoor").len(), baseline + 2);
    }

    #[test]
    fn test_change_breaks_run() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        ingestor.ingest("indoor", 20.0, 40.0).unwrap();
        ingestor.ingest("indoor", 20.0, 40.0).unwrap();
        ingestor.ingest("indoor", 20.1, 40.0).unwrap();
        ingestor.ingest("indoor", 20.0, 40.0).unwrap();

        assert_eq!(
            stored(&storage, "indoor"),
            vec![(20.0, 40.0), (20.0, 40.0), (20.1, 40.0), (20.0, 40.0)]
        );
    }

    #[test]
    fn test_compares_rounded_values() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        ingestor.ingest("indoor", 20.04, 40.4).unwrap();
        ingestor.ingest("indoor", 19.96, 39.6).unwrap();
        let outcome = ingestor.ingest("indoor", 20.0, 40.0).unwrap();

        assert!(outcome.is_compacted());
        assert_eq!(stored(&storage, "indoor"), vec![(20.0, 40.0), (20.0, 40.0)]);
    }

    #[test]
    fn test_huge_values_stored_as_is_and_not_compacted() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        let mut outcomes = Vec::new();
        for t in [1e18, 2e18, 3e18] {
            outcomes.push(ingestor.ingest("furnace", t, 40.0).unwrap());
        }

        assert!(outcomes.iter().all(|o| !o.is_compacted()));
        assert_eq!(
            stored(&storage, "furnace"),
            vec![(1e18, 40.0), (2e18, 40.0), (3e18, 40.0)]
        );
    }

    #[test]
    fn test_huge_identical_values_still_compact() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        for _ in 0..3 {
            ingestor.ingest("furnace", 1e19, -5e18).unwrap();
        }

        assert_eq!(
            stored(&storage, "furnace"),
            vec![(1e19, -5e18), (1e19, -5e18)]
        );
    }

    #[test]
    fn test_sensors_are_independent() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        for _ in 0..3 {
            ingestor.ingest("indoor", 20.0, 40.0).unwrap();
            ingestor.ingest("outdoor", 20.0, 40.0).unwrap();
        }

        assert_eq!(stored(&storage, "indoor").len(), 2);
        assert_eq!(stored(&storage, "outdoor").len(), 2);
    }

    #[test]
    fn test_finer_stored_values_not_collapsed() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        // Written under the one-decimal policy before a config change
        storage.insert_reading("indoor", 20.0, 47.3).unwrap();
        storage.insert_reading("indoor", 20.0, 47.3).unwrap();

        let outcome = ingestor.ingest("indoor", 20.0, 47.3).unwrap();
        assert!(!outcome.is_compacted());
        assert_eq!(stored(&storage, "indoor").len(), 3);
    }

    #[test]
    fn test_serializable_mode() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig {
            consistency: ConsistencyMode::Serializable,
            ..Default::default()
        });

        for _ in 0..5 {
            ingestor.ingest("indoor", 20.0, 40.0).unwrap();
        }

        assert_eq!(stored(&storage, "indoor").len(), 2);
    }

    #[test]
    fn test_serializable_mode_under_concurrency() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig {
            consistency: ConsistencyMode::Serializable,
            ..Default::default()
        });
        let ingestor = Arc::new(ingestor);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ingestor = Arc::clone(&ingestor);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        ingestor.ingest("indoor", 20.0, 40.0).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stored(&storage, "indoor").len(), 2);
    }

    #[test]
    fn test_one_decimal_precision() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig {
            humidity_precision: HumidityPrecision::OneDecimal,
            ..Default::default()
        });

        ingestor.ingest("indoor", 20.0, 40.04).unwrap();
        ingestor.ingest("indoor", 20.0, 40.06).unwrap();

        assert_eq!(stored(&storage, "indoor"), vec![(20.0, 40.0), (20.0, 40.1)]);
    }

    #[test]
    fn test_invalid_input() {
        let (ingestor, storage, _dir) = create_ingestor(DedupConfig::default());

        assert!(matches!(
            ingestor.ingest("  ", 20.0, 40.0),
            Err(SensorError::InvalidInput(_))
        ));
        assert!(matches!(
            ingestor.ingest("indoor", f64::NAN, 40.0),
            Err(SensorError::InvalidInput(_))
        ));
        assert!(storage.list_readings("indoor", None).unwrap().is_empty());
    }
}
