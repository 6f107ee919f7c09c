//! Sensor Server
//!
//! Run with: cargo run --bin sensorserver -- [--config FILE] [--database FILE]
//!
//! # Configuration
//!
//! See [`sensorserver::config`] for the file format. Environment variables
//! prefixed with `SENSORSERVER_` override file values, and `RUST_LOG`
//! overrides the configured log level.

use anyhow::Context;
use clap::Parser;
use sensorserver::api::{serve, AppState};
use sensorserver::config::{Config, LoggingConfig};
use sensorserver::storage::{StorageConfig, StorageEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "sensorserver")]
#[command(about = "Sensor data server: readings, events, latest values")]
#[command(version)]
struct Args {
    /// Config file (defaults to the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the configured storage location
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Nothing is logged until the subscriber exists, so load errors abort here
    let (config, source) =
        Config::load_from(args.config.as_deref()).context("Failed to load config")?;
    init_tracing(&config.logging);

    tracing::info!("Starting sensor server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration: {}", source);

    let storage_config = match &args.database {
        Some(path) => StorageConfig {
            busy_timeout_ms: config.storage.busy_timeout_ms,
            ..StorageConfig::from_database_path(path)
        },
        None => config.storage_config(),
    };
    let dedup = config.dedup_config();
    let api_config = config.api_config();

    tracing::info!("Database: {:?}", storage_config.database_path());
    tracing::info!(
        humidity_precision = %dedup.humidity_precision,
        consistency = %dedup.consistency,
        "Dedup policy"
    );

    // Initialize storage engine
    let storage = Arc::new(
        StorageEngine::open(storage_config).context("Failed to open storage engine")?,
    );
    let stats = storage.stats().context("Failed to read storage stats")?;
    tracing::info!("Storage engine initialized: {}", stats);

    // Run server
    let state = AppState::new(Arc::clone(&storage), dedup, api_config.clone());
    serve(state, &api_config).await?;

    // Graceful shutdown
    tracing::info!("Shutting down storage engine...");
    storage.close().context("Failed to close storage engine")?;
    tracing::info!("Sensor server stopped");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("sensorserver={},tower_http=info", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
