//! # Tally
//!
//! Concurrency-control strategies for one contended counter, and a harness
//! that measures them.
//!
//! Many workers race to increment a single counter. Each scenario pairs an
//! increment algorithm with a backend, and each run reports throughput and
//! whether the final value kept the scenario's promise.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tally::prelude::*;
//!
//! let tally = Tally::builder()
//!     .scenario(ScenarioKind::RowLocking)
//!     .sql_path("./data/counter.db")
//!     .workers(5)
//!     .requests_per_worker(10_000)
//!     .reset(true)
//!     .open()?;
//! tally.prepare()?;
//!
//! let report = tally.run()?;
//! assert_eq!(report.count, 50_000);
//! ```
//!
//! ## Scenarios
//!
//! | Backend | Scenarios |
//! |---------|-----------|
//! | memory  | `memory` |
//! | file    | `file-lock` |
//! | sql     | `lost-update` (UNSAFE), `in-place`, `row-locking`, `serializable`, `optimistic` |
//! | map     | `map-no-lock` (UNSAFE), `map-pessimistic`, `map-optimistic` |
//! | atomic  | `atomic-long` |
//!
//! ## Layers
//!
//! - [`CounterStore`]: the five backends
//! - [`IncrementStrategy`]: one worker's increment algorithm
//! - [`LoadGenerator`]: barrier-synchronized workers
//! - [`ConsistencyReport`]: final value against the promise

#![warn(missing_docs)]

mod error;
mod runner;
mod types;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use runner::{Tally, TallyBuilder};

// Re-export types
pub use types::*;
