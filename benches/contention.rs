//! Contention Benchmarks - cost of each concurrency-control strategy
//!
//! ## Benchmark Groups
//!
//! | Group | What it measures |
//! |-------|------------------|
//! | uncontended/* | One worker: the bare cost of a strategy's increment |
//! | contended/* | N workers on one counter: lock waits, conflicts and retries |
//!
//! Scenarios on SQLite use a fresh database per measurement; map and atomic
//! scenarios run on the embedded grid.
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench contention
//! cargo bench --bench contention -- "contended/optimistic"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tally::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Utilities - setup happens here, outside timed loops
// =============================================================================

fn prepared(kind: ScenarioKind, dir: &TempDir) -> Tally {
    let tally = Tally::builder()
        .scenario(kind)
        .sql_path(dir.path().join("counter.db"))
        .file_path(dir.path().join("counter.txt"))
        .open()
        .unwrap();
    tally.prepare().unwrap();
    tally.reset_to(0).unwrap();
    tally
}

/// Scenarios cheap enough to run at benchmark iteration counts
const BENCHED: [ScenarioKind; 8] = [
    ScenarioKind::Memory,
    ScenarioKind::InPlace,
    ScenarioKind::RowLocking,
    ScenarioKind::Serializable,
    ScenarioKind::Optimistic,
    ScenarioKind::MapPessimistic,
    ScenarioKind::MapOptimistic,
    ScenarioKind::AtomicLong,
];

// =============================================================================
// Uncontended
// =============================================================================

fn uncontended_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(1));

    for kind in BENCHED {
        let dir = TempDir::new().unwrap();
        let tally = prepared(kind, &dir);
        let mut strategy = tally.scenario().connect().unwrap();

        group.bench_function(kind.name(), |b| {
            b.iter(|| black_box(strategy.increment().unwrap()));
        });
    }

    group.finish();
}

// =============================================================================
// Contended
// =============================================================================

// Semantic: every worker increments the same counter
// Regression: lock wait and retry cost as workers grow

fn contended_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(10);

    for kind in BENCHED {
        for workers in [2usize, 4] {
            group.throughput(Throughput::Elements(workers as u64));
            group.bench_with_input(
                BenchmarkId::new(kind.name(), workers),
                &workers,
                |b, &workers| {
                    b.iter_custom(|iters| {
                        let dir = TempDir::new().unwrap();
                        let tally = prepared(kind, &dir);
                        let per_worker = (iters / workers as u64).max(1);
                        let barrier = Arc::new(Barrier::new(workers + 1));

                        let elapsed = thread::scope(|s| {
                            for _ in 0..workers {
                                let mut strategy = tally.scenario().connect().unwrap();
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..per_worker {
                                        black_box(strategy.increment().unwrap());
                                    }
                                });
                            }
                            barrier.wait();
                            Instant::now()
                        })
                        .elapsed();

                        assert_eq!(tally.read().unwrap().value, per_worker * workers as u64);
                        elapsed
                    });
                },
            );
        }
    }

    group.finish();
}

// =============================================================================
// Benchmark Groups
// =============================================================================

criterion_group!(
    name = uncontended;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = uncontended_benchmarks
);

criterion_group!(
    name = contended;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(10);
    targets = contended_benchmarks
);

criterion_main!(uncontended, contended);
