//! Scenario descriptor: an algorithm bound to a backend

use crate::atomic::AtomicLongStrategy;
use crate::direct::DirectStrategy;
use crate::map::MapStrategy;
use crate::retry::RetryPolicy;
use crate::sql::SqlStrategy;
use crate::strategy::IncrementStrategy;
use std::fmt;
use std::time::Duration;
use tally_core::{BackendKind, Correctness, Error, Result, ScenarioKind, TallyConfig};
use tally_storage::{
    AtomicLongCounter, CounterStore, FileCounter, Grid, GridConfig, MapCounter, MemoryCounter,
    RedoPolicy, SqlCounter,
};

/// The backend a scenario runs against
#[derive(Debug, Clone)]
pub enum Target {
    /// In-process cell
    Memory(MemoryCounter),
    /// Locked text file
    File(FileCounter),
    /// SQLite row
    Sql(SqlCounter),
    /// Replicated map entry
    Map(MapCounter),
    /// CP atomic reference
    Atomic(AtomicLongCounter),
}

impl Target {
    /// Which backend this is
    pub fn kind(&self) -> BackendKind {
        self.store().kind()
    }

    /// The backend as a plain counter store
    pub fn store(&self) -> &dyn CounterStore {
        match self {
            Target::Memory(c) => c,
            Target::File(c) => c,
            Target::Sql(c) => c,
            Target::Map(c) => c,
            Target::Atomic(c) => c,
        }
    }

    /// Build the `backend` target described by `config`
    ///
    /// Map and atomic targets live on `grid`.
    pub fn from_config(backend: BackendKind, config: &TallyConfig, grid: &Grid) -> Self {
        match backend {
            BackendKind::Memory => Target::Memory(MemoryCounter::with_value(config.initial_value)),
            BackendKind::File => Target::File(
                FileCounter::new(&config.file.path)
                    .with_lock_timeout(Duration::from_millis(config.file.lock_timeout_ms)),
            ),
            BackendKind::Sql => Target::Sql(
                SqlCounter::new(&config.sql.path, config.sql.user_id)
                    .with_busy_timeout(Duration::from_millis(config.sql.busy_timeout_ms)),
            ),
            BackendKind::Map => Target::Map(MapCounter::new(
                grid.clone(),
                &config.grid.map_name,
                &config.grid.key,
            )),
            BackendKind::Atomic => Target::Atomic(AtomicLongCounter::new(
                grid.clone(),
                &config.grid.atomic_name,
                redo_policy(config),
            )),
        }
    }
}

/// Grid tuning from configuration
pub fn grid_config(config: &TallyConfig) -> GridConfig {
    GridConfig {
        lock_timeout: Duration::from_millis(config.grid.lock_timeout_ms),
        latency: Duration::from_micros(config.grid.latency_us),
    }
}

/// Redo policy from configuration
pub fn redo_policy(config: &TallyConfig) -> RedoPolicy {
    if config.grid.redo_operation {
        RedoPolicy::enabled(
            config.grid.max_redos,
            Duration::from_millis(config.grid.redo_backoff_ms),
        )
    } else {
        RedoPolicy::disabled()
    }
}

/// One named scenario on one backend
///
/// Immutable once built. [`Scenario::connect`] hands each worker its own
/// strategy on its own session.
#[derive(Debug, Clone)]
pub struct Scenario {
    kind: ScenarioKind,
    target: Target,
    policy: RetryPolicy,
    think_time: Option<Duration>,
}

impl Scenario {
    /// Bind `kind` to `target`
    ///
    /// # Errors
    ///
    /// `ConfigurationFault` if the scenario does not run on that backend.
    pub fn new(kind: ScenarioKind, target: Target) -> Result<Self> {
        if kind.backend() != target.kind() {
            return Err(Error::ConfigurationFault(format!(
                "scenario {} needs the {} backend, got {}",
                kind,
                kind.backend(),
                target.kind()
            )));
        }
        Ok(Self {
            kind,
            target,
            policy: RetryPolicy::default(),
            think_time: None,
        })
    }

    /// Build from validated configuration
    pub fn from_config(config: &TallyConfig, grid: &Grid) -> Result<Self> {
        config.validate()?;
        let kind = config.scenario_kind();
        let target = Target::from_config(kind.backend(), config, grid);
        Ok(Self::new(kind, target)?
            .with_retry(RetryPolicy::from(&config.retry))
            .with_think_time(config.think_time()))
    }

    /// Override the retry policy
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sleep between read and write in read-modify-write strategies
    pub fn with_think_time(mut self, think_time: Option<Duration>) -> Self {
        self.think_time = think_time.filter(|d| !d.is_zero());
        self
    }

    /// Scenario kind
    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    /// Scenario name
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Promised consistency
    pub fn correctness(&self) -> Correctness {
        self.kind.correctness()
    }

    /// Retry policy handed to strategies
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Configured think time
    pub fn think_time(&self) -> Option<Duration> {
        self.think_time
    }

    /// Backend
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Backend as a plain counter store, for prepare, reset and the
    /// authoritative read
    pub fn store(&self) -> &dyn CounterStore {
        self.target.store()
    }

    /// Open a session and build one worker's strategy on it
    pub fn connect(&self) -> Result<Box<dyn IncrementStrategy>> {
        let (kind, policy, think) = (self.kind, self.policy, self.think_time);
        let strategy: Box<dyn IncrementStrategy> = match &self.target {
            Target::Memory(c) => Box::new(DirectStrategy::new(kind, c.clone(), policy)?),
            Target::File(c) => Box::new(DirectStrategy::new(kind, c.clone(), policy)?),
            Target::Sql(c) => Box::new(SqlStrategy::new(kind, c.connect()?, policy, think)?),
            Target::Map(c) => Box::new(MapStrategy::new(
                kind,
                c.session()?,
                c.map(),
                c.key(),
                policy,
                think,
            )?),
            Target::Atomic(c) => Box::new(AtomicLongStrategy::new(c.session()?, c.name())),
        };
        Ok(strategy)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.kind,
            self.kind.backend(),
            self.kind.correctness()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn mismatched_backend_is_rejected() {
        let err = Scenario::new(ScenarioKind::InPlace, Target::Memory(MemoryCounter::new()))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationFault(_)));
    }

    #[test]
    fn connect_builds_working_strategy_for_every_scenario() {
        let dir = TempDir::new().unwrap();
        let grid = Grid::default();
        for kind in ScenarioKind::ALL {
            let config = TallyConfig {
                scenario: Some(kind),
                file: tally_core::FileSettings {
                    path: dir.path().join(format!("{}.txt", kind)),
                    ..Default::default()
                },
                sql: tally_core::SqlSettings {
                    path: dir.path().join(format!("{}.db", kind)),
                    ..Default::default()
                },
                ..Default::default()
            };
            let scenario = Scenario::from_config(&config, &grid).unwrap();
            scenario.store().prepare().unwrap();
            scenario.store().reset(0).unwrap();

            let mut strategy = scenario.connect().unwrap();
            assert_eq!(strategy.scenario(), kind);
            assert_eq!(strategy.increment().unwrap().value, 1, "{}", kind);
            assert_eq!(scenario.store().read().unwrap().value, 1, "{}", kind);
        }
    }

    #[test]
    fn zero_think_time_is_none() {
        let s = Scenario::new(ScenarioKind::Memory, Target::Memory(MemoryCounter::new()))
            .unwrap()
            .with_think_time(Some(Duration::ZERO));
        assert_eq!(s.think_time(), None);
    }

    #[test]
    fn unprepared_sql_fails_to_connect() {
        let dir = TempDir::new().unwrap();
        let target = Target::Sql(SqlCounter::new(dir.path().join("missing.db"), 1));
        let scenario = Scenario::new(ScenarioKind::InPlace, target).unwrap();
        assert!(matches!(
            scenario.connect(),
            Err(Error::ConfigurationFault(_))
        ));
    }

    #[test]
    fn display_names_backend_and_guarantee() {
        let s = Scenario::new(ScenarioKind::Memory, Target::Memory(MemoryCounter::new())).unwrap();
        assert_eq!(s.to_string(), "memory (memory, SAFE)");
    }
}
