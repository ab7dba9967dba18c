//! Scenario Test Suite
//!
//! End-to-end runs through the `Tally` facade: real workers, real barrier,
//! real SQLite files in temp directories, the embedded grid.
//!
//! ## Modules
//!
//! - `safe`: every SAFE scenario ends at exactly W*R
//! - `lost_updates`: UNSAFE scenarios never exceed W*R and lose with a think time
//! - `bootstrap`: prepare idempotence, reset, unprepared stores
//! - `faults`: unavailable backends, session loss and the redo flag
//! - `concrete`: full-size reference runs (ignored by default)
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test scenarios
//! cargo test --test scenarios -- --ignored concrete::
//! ```

pub use tally::prelude::*;
pub use tally::{CpFault, SqlCounter, Target};
pub use tempfile::TempDir;

pub mod bootstrap;
pub mod concrete;
pub mod faults;
pub mod lost_updates;
pub mod safe;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Open `kind` with stores under a fresh temp dir, prepared and reset to 0
pub fn open_prepared(kind: ScenarioKind, workers: usize, requests: usize) -> (TempDir, Tally) {
    let dir = TempDir::new().expect("temp dir");
    let tally = Tally::builder()
        .scenario(kind)
        .sql_path(dir.path().join("counter.db"))
        .file_path(dir.path().join("counter.txt"))
        .workers(workers)
        .requests_per_worker(requests)
        .reset(true)
        .open()
        .expect("open tally");
    tally.prepare().expect("prepare");
    (dir, tally)
}

/// Every scenario that promises an exact count
pub fn safe_scenarios() -> impl Iterator<Item = ScenarioKind> {
    ScenarioKind::ALL
        .into_iter()
        .filter(|k| k.correctness() == Correctness::Safe)
}
