//! Public types for the Tally API.

// Counter and scenario vocabulary
pub use tally_core::{BackendKind, Correctness, CounterState, ScenarioKind};

// Configuration
pub use tally_core::{FileSettings, GridSettings, RetrySettings, SqlSettings, TallyConfig};

// Backends
pub use tally_storage::{
    AtomicLongCounter, CounterStore, CpFault, FileCounter, Grid, GridConfig, MapCounter,
    MemoryCounter, RedoPolicy, SqlCounter,
};

// Strategies
pub use tally_concurrency::{Increment, IncrementStrategy, RetryPolicy, Scenario, Target};

// Harness
pub use tally_harness::{
    ConsistencyReport, Guarantee, LoadGenerator, RunPhase, RunReport, Verdict, WorkerResult,
};
