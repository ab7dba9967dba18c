//! Run configuration
//!
//! A [`TallyConfig`] is assembled in three layers, later layers winning:
//!
//! 1. Defaults (10 workers × 10 000 requests, in-memory backend)
//! 2. A TOML file ([`TallyConfig::load`])
//! 3. `TALLY_*` environment variables ([`TallyConfig::apply_env`])
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```toml
//! scenario = "optimistic"
//! workers = 5
//! requests_per_worker = 2000
//! reset = true
//!
//! [sql]
//! path = "./data/counter.db"
//! busy_timeout_ms = 5000
//! ```

use crate::error::{Error, Result};
use crate::types::{BackendKind, ScenarioKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full configuration of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TallyConfig {
    /// Backend; inferred from `scenario` when absent
    pub backend: Option<BackendKind>,
    /// Scenario; defaults per backend when absent
    pub scenario: Option<ScenarioKind>,
    /// Concurrent workers
    pub workers: usize,
    /// Sequential increments per worker
    pub requests_per_worker: usize,
    /// Reset the counter before running
    pub reset: bool,
    /// Value written by a reset
    pub initial_value: u64,
    /// Pause between read and write in read-modify-write scenarios
    pub think_time_ms: u64,
    /// File backend settings
    pub file: FileSettings,
    /// Relational backend settings
    pub sql: SqlSettings,
    /// Distributed map and atomic settings
    pub grid: GridSettings,
    /// Retry loop settings
    pub retry: RetrySettings,
}

/// File backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    /// Counter file
    pub path: PathBuf,
    /// Longest wait for the exclusive file lock
    pub lock_timeout_ms: u64,
}

/// Relational backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlSettings {
    /// SQLite database file
    pub path: PathBuf,
    /// Key of the counter row
    pub user_id: i64,
    /// Longest wait on a locked database per statement
    pub busy_timeout_ms: u64,
}

/// Distributed map and atomic primitive settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridSettings {
    /// Map holding the counter entry
    pub map_name: String,
    /// Key of the counter entry
    pub key: String,
    /// Name of the atomic reference
    pub atomic_name: String,
    /// Longest wait for a distributed key lock
    pub lock_timeout_ms: u64,
    /// Simulated round trip per grid call
    pub latency_us: u64,
    /// Reissue atomic calls after a session loss
    pub redo_operation: bool,
    /// Reissues allowed per call
    pub max_redos: u32,
    /// Pause before each reissue
    pub redo_backoff_ms: u64,
}

/// Retry loop settings for optimistic and serializable scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Attempts per increment, including the first
    pub max_attempts: u32,
    /// Backoff before the first retry
    pub base_backoff_us: u64,
    /// Backoff ceiling
    pub max_backoff_us: u64,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            backend: None,
            scenario: None,
            workers: 10,
            requests_per_worker: 10_000,
            reset: false,
            initial_value: 0,
            think_time_ms: 0,
            file: FileSettings::default(),
            sql: SqlSettings::default(),
            grid: GridSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/counter.txt"),
            lock_timeout_ms: 5_000,
        }
    }
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/counter.db"),
            user_id: 1,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            map_name: "counter-map".to_string(),
            key: "likes".to_string(),
            atomic_name: "counter-long".to_string(),
            lock_timeout_ms: 5_000,
            latency_us: 0,
            redo_operation: false,
            max_redos: 3,
            redo_backoff_ms: 10,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1_000,
            base_backoff_us: 50,
            max_backoff_us: 5_000,
        }
    }
}

impl TallyConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigurationFault(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `TALLY_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply `TALLY_*` overrides from an arbitrary lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TALLY_BACKEND") {
            self.backend = Some(v.parse()?);
        }
        if let Some(v) = lookup("TALLY_SCENARIO") {
            self.scenario = Some(v.parse()?);
        }
        if let Some(v) = lookup("TALLY_FILE") {
            self.file.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TALLY_SQL_PATH") {
            self.sql.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TALLY_WORKERS") {
            self.workers = parse_number("TALLY_WORKERS", &v)?;
        }
        if let Some(v) = lookup("TALLY_REQUESTS_PER_WORKER") {
            self.requests_per_worker = parse_number("TALLY_REQUESTS_PER_WORKER", &v)?;
        }
        if let Some(v) = lookup("TALLY_REDO_OPERATION") {
            self.grid.redo_operation = parse_flag("TALLY_REDO_OPERATION", &v)?;
        }
        Ok(())
    }

    /// Scenario to run, falling back to the backend's default
    pub fn scenario_kind(&self) -> ScenarioKind {
        if let Some(kind) = self.scenario {
            return kind;
        }
        match self.backend.unwrap_or(BackendKind::Memory) {
            BackendKind::Memory => ScenarioKind::Memory,
            BackendKind::File => ScenarioKind::FileLock,
            BackendKind::Sql => ScenarioKind::InPlace,
            BackendKind::Map => ScenarioKind::MapPessimistic,
            BackendKind::Atomic => ScenarioKind::AtomicLong,
        }
    }

    /// Backend to run against
    pub fn backend_kind(&self) -> BackendKind {
        self.backend
            .unwrap_or_else(|| self.scenario_kind().backend())
    }

    /// Think time as a duration, `None` when zero
    pub fn think_time(&self) -> Option<Duration> {
        (self.think_time_ms > 0).then(|| Duration::from_millis(self.think_time_ms))
    }

    /// Reject configurations no run can start from
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::ConfigurationFault("workers must be at least 1".into()));
        }
        if self.requests_per_worker == 0 {
            return Err(Error::ConfigurationFault(
                "requests_per_worker must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::ConfigurationFault(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        let scenario = self.scenario_kind();
        if let Some(backend) = self.backend {
            if scenario.backend() != backend {
                return Err(Error::ConfigurationFault(format!(
                    "scenario {} runs on the {} backend, not {}",
                    scenario,
                    scenario.backend(),
                    backend
                )));
            }
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::ConfigurationFault(format!("{} is not a number: {}", name, value)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::ConfigurationFault(format!(
            "{} is not a boolean: {}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_reference_benchmark() {
        let config = TallyConfig::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.requests_per_worker, 10_000);
        assert_eq!(config.grid.key, "likes");
        assert!(!config.grid.redo_operation);
        assert_eq!(config.scenario_kind(), ScenarioKind::Memory);
        config.validate().unwrap();
    }

    #[test]
    fn toml_sections_parse() {
        let config = TallyConfig::from_toml_str(
            r#"
            scenario = "optimistic"
            workers = 5
            requests_per_worker = 200
            reset = true

            [sql]
            path = "/tmp/counter.db"
            busy_timeout_ms = 250

            [retry]
            max_attempts = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.scenario_kind(), ScenarioKind::Optimistic);
        assert_eq!(config.backend_kind(), BackendKind::Sql);
        assert_eq!(config.sql.path, PathBuf::from("/tmp/counter.db"));
        assert_eq!(config.sql.user_id, 1);
        assert_eq!(config.retry.max_attempts, 50);
        assert_eq!(config.retry.base_backoff_us, 50);
    }

    #[test]
    fn unknown_field_is_configuration_fault() {
        let err = TallyConfig::from_toml_str("wokers = 3").unwrap_err();
        assert!(matches!(err, Error::ConfigurationFault(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("TALLY_SCENARIO", "atomic-long"),
            ("TALLY_WORKERS", "3"),
            ("TALLY_REDO_OPERATION", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = TallyConfig::default();
        config
            .apply_env_with(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.scenario_kind(), ScenarioKind::AtomicLong);
        assert_eq!(config.workers, 3);
        assert!(config.grid.redo_operation);
    }

    #[test]
    fn bad_env_number_is_rejected() {
        let mut config = TallyConfig::default();
        let err = config
            .apply_env_with(|name| (name == "TALLY_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationFault(_)));
    }

    #[test]
    fn mismatched_backend_fails_validation() {
        let config = TallyConfig {
            backend: Some(BackendKind::Map),
            scenario: Some(ScenarioKind::RowLocking),
            ..TallyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::ConfigurationFault(_))
        ));
    }

    #[test]
    fn zero_workers_fails_validation() {
        let config = TallyConfig {
            workers: 0,
            ..TallyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn backend_alone_picks_default_scenario() {
        let config = TallyConfig {
            backend: Some(BackendKind::Map),
            ..TallyConfig::default()
        };
        assert_eq!(config.scenario_kind(), ScenarioKind::MapPessimistic);
    }
}
