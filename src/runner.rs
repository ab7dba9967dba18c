//! Main entry point for Tally.
//!
//! [`Tally`] binds one configuration to one scenario: it owns the embedded
//! grid, prepares and resets the counter, and runs the load generator.

use crate::error::Result;
use std::path::Path;
use std::time::Duration;
use tally_concurrency::{grid_config, Scenario};
use tally_core::{CounterState, ScenarioKind, TallyConfig};
use tally_harness::{LoadGenerator, RunReport};
use tally_storage::Grid;

/// A configured benchmark.
///
/// Create one with [`Tally::open`] or [`Tally::builder`].
///
/// # Example
///
/// ```ignore
/// use tally::prelude::*;
///
/// let tally = Tally::builder()
///     .scenario(ScenarioKind::Optimistic)
///     .sql_path("./data/counter.db")
///     .workers(5)
///     .requests_per_worker(1_000)
///     .reset(true)
///     .open()?;
///
/// tally.prepare()?;
/// let report = tally.run()?;
/// println!("{report}");
/// ```
#[derive(Debug)]
pub struct Tally {
    config: TallyConfig,
    grid: Grid,
    scenario: Scenario,
}

impl Tally {
    /// Validate `config` and bind its scenario.
    ///
    /// Map and atomic scenarios get a fresh embedded grid.
    pub fn open(config: TallyConfig) -> Result<Self> {
        Self::open_on(config, None)
    }

    /// Like [`Tally::open`], on an existing grid.
    pub fn open_on(config: TallyConfig, grid: Option<Grid>) -> Result<Self> {
        config.validate()?;
        let grid = grid.unwrap_or_else(|| Grid::new(grid_config(&config)));
        let scenario = Scenario::from_config(&config, &grid)?;
        Ok(Self {
            config,
            grid,
            scenario,
        })
    }

    /// Load a TOML file, apply `TALLY_*` overrides and open.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = TallyConfig::load(path)?;
        config.apply_env()?;
        Self::open(config)
    }

    /// Create a builder starting from defaults.
    pub fn builder() -> TallyBuilder {
        TallyBuilder::new()
    }

    /// Configuration in force.
    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    /// Bound scenario.
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Embedded grid serving map and atomic scenarios.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Create the backing store if absent. Never resets a value.
    pub fn prepare(&self) -> Result<()> {
        self.scenario.store().prepare()
    }

    /// Set the counter to the configured initial value.
    pub fn reset(&self) -> Result<()> {
        self.reset_to(self.config.initial_value)
    }

    /// Set the counter to `value`.
    pub fn reset_to(&self, value: u64) -> Result<()> {
        tracing::info!(scenario = %self.scenario.kind(), value, "resetting counter");
        self.scenario.store().reset(value)
    }

    /// Authoritative read of the counter.
    pub fn read(&self) -> Result<CounterState> {
        self.scenario.store().read()
    }

    /// Run the load generator once, resetting first if configured.
    pub fn run(&self) -> Result<RunReport> {
        if self.config.reset {
            self.reset()?;
        }
        LoadGenerator::from_config(&self.config)?.run(&self.scenario)
    }
}

/// Builder over [`TallyConfig`].
#[derive(Debug, Clone, Default)]
pub struct TallyBuilder {
    config: TallyConfig,
    grid: Option<Grid>,
}

impl TallyBuilder {
    /// Start from default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: TallyConfig) -> Self {
        Self { config, grid: None }
    }

    /// Scenario to run; its backend follows.
    pub fn scenario(mut self, kind: ScenarioKind) -> Self {
        self.config.scenario = Some(kind);
        self.config.backend = None;
        self
    }

    /// Concurrent workers.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Increments per worker.
    pub fn requests_per_worker(mut self, requests: usize) -> Self {
        self.config.requests_per_worker = requests;
        self
    }

    /// Reset to the initial value before each run.
    pub fn reset(mut self, reset: bool) -> Self {
        self.config.reset = reset;
        self
    }

    /// Value a reset writes.
    pub fn initial_value(mut self, value: u64) -> Self {
        self.config.initial_value = value;
        self
    }

    /// SQLite database file.
    pub fn sql_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.sql.path = path.as_ref().to_path_buf();
        self
    }

    /// Counter file.
    pub fn file_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.file.path = path.as_ref().to_path_buf();
        self
    }

    /// Sleep between read and write in read-modify-write scenarios.
    pub fn think_time(mut self, think_time: Duration) -> Self {
        self.config.think_time_ms = think_time.as_millis() as u64;
        self
    }

    /// Reissue atomic calls that lose their session.
    pub fn redo_operation(mut self, enabled: bool) -> Self {
        self.config.grid.redo_operation = enabled;
        self
    }

    /// Retry attempts per increment for conflict-retrying scenarios.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Run map and atomic scenarios on `grid` instead of a fresh one.
    pub fn grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Validate and open.
    pub fn open(self) -> Result<Tally> {
        Tally::open_on(self.config, self.grid)
    }
}
