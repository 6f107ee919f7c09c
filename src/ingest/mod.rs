//! Ingestion
//!
//! Everything between an accepted request and the storage engine:
//!
//! - **dedup**: rounding and compaction of identical consecutive readings
//! - **events**: state-transition tracking for discrete events
//!
//! ```text
//! PUT reading → ReadingIngestor → reconcile (latest 2 → delete? → insert)
//! PUT event   → EventTracker    → track (latest event → insert?)
//! ```

mod dedup;
mod events;

pub use dedup::{
    reconcile, ConsistencyMode, DedupConfig, DedupOutcome, HumidityPrecision, Measurement,
    ReadingIngestor, DEDUP_WINDOW, TEMPERATURE_DIGITS,
};
pub use events::{track, EventOutcome, EventTracker};
