//! Benchmarks for the sensor storage engine and ingest path
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sensorserver::ingest::{ConsistencyMode, DedupConfig, ReadingIngestor};
use sensorserver::storage::*;
use std::sync::Arc;
use tempfile::tempdir;

fn open_engine(dir: &tempfile::TempDir) -> Arc<StorageEngine> {
    Arc::new(StorageEngine::open(StorageConfig::new(dir.path())).unwrap())
}

fn bench_storage(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert_reading", |b| {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir);
        let mut i = 0u64;

        b.iter(|| {
            i += 1;
            engine
                .insert_reading(black_box("bench"), (i % 300) as f64 / 10.0, 45.0)
                .unwrap()
        });
    });

    group.bench_function("latest_n_2_of_10000", |b| {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir);
        for i in 0..10_000 {
            engine
                .insert_reading("bench", (i % 300) as f64 / 10.0, 45.0)
                .unwrap();
        }

        b.iter(|| engine.latest_n_readings(black_box("bench"), 2).unwrap());
    });

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    group.throughput(Throughput::Elements(1));

    for consistency in [ConsistencyMode::Relaxed, ConsistencyMode::Serializable] {
        group.bench_function(format!("constant_sensor_{}", consistency), |b| {
            let dir = tempdir().unwrap();
            let ingestor = ReadingIngestor::new(
                open_engine(&dir),
                DedupConfig {
                    consistency,
                    ..Default::default()
                },
            );

            // Every iteration after the second compacts
            b.iter(|| ingestor.ingest(black_box("bench"), 21.5, 47.0).unwrap());
        });

        group.bench_function(format!("changing_sensor_{}", consistency), |b| {
            let dir = tempdir().unwrap();
            let ingestor = ReadingIngestor::new(
                open_engine(&dir),
                DedupConfig {
                    consistency,
                    ..Default::default()
                },
            );
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                ingestor
                    .ingest(black_box("bench"), (i % 300) as f64 / 10.0, 47.0)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_storage, bench_ingest);
criterion_main!(benches);
