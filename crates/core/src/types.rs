//! Core types shared by every layer
//!
//! - [`CounterState`]: the value (and optional version) of the one counter
//! - [`BackendKind`]: which storage substrate holds the counter
//! - [`ScenarioKind`]: which increment algorithm runs against it
//! - [`Correctness`]: whether the algorithm promises exact totals

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Snapshot of the counter as read from its backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterState {
    /// Current value
    pub value: u64,
    /// Row version, present only for backends that keep one
    pub version: Option<u64>,
}

impl CounterState {
    /// State without a version tag
    pub fn new(value: u64) -> Self {
        Self {
            value,
            version: None,
        }
    }

    /// State carrying a version tag
    pub fn versioned(value: u64, version: u64) -> Self {
        Self {
            value,
            version: Some(version),
        }
    }
}

/// Storage substrate holding the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Mutex-guarded in-process cell
    Memory,
    /// Text file under an advisory lock
    File,
    /// Single row in a relational table
    Sql,
    /// Entry in a replicated map
    Map,
    /// Linearizable atomic reference in a CP group
    Atomic,
}

impl BackendKind {
    /// Every backend, in display order
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Memory,
        BackendKind::File,
        BackendKind::Sql,
        BackendKind::Map,
        BackendKind::Atomic,
    ];

    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Sql => "sql",
            BackendKind::Map => "map",
            BackendKind::Atomic => "atomic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::ConfigurationFault(format!("unknown backend: {}", s)))
    }
}

/// What a scenario promises about the final counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correctness {
    /// Every successful increment is reflected exactly once
    Safe,
    /// Only `observed <= expected` holds; increments may be lost
    Unsafe,
}

impl fmt::Display for Correctness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correctness::Safe => f.write_str("SAFE"),
            Correctness::Unsafe => f.write_str("UNSAFE"),
        }
    }
}

/// Increment algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Direct increment of the in-process cell
    Memory,
    /// Direct increment of the file under an exclusive lock
    FileLock,
    /// Read, add one locally, write back without a guard
    LostUpdate,
    /// Single `counter = counter + 1` statement
    InPlace,
    /// Exclusive row lock taken before the read
    RowLocking,
    /// Strictest isolation with abort-retry
    Serializable,
    /// Version-predicated update with retry
    Optimistic,
    /// Map get/put without coordination
    MapNoLock,
    /// Map get/put under a distributed key lock
    MapPessimistic,
    /// Map get then replace-if-equals with retry
    MapOptimistic,
    /// Linearizable increment-and-get
    AtomicLong,
}

impl ScenarioKind {
    /// Every scenario, grouped by backend
    pub const ALL: [ScenarioKind; 11] = [
        ScenarioKind::Memory,
        ScenarioKind::FileLock,
        ScenarioKind::LostUpdate,
        ScenarioKind::InPlace,
        ScenarioKind::RowLocking,
        ScenarioKind::Serializable,
        ScenarioKind::Optimistic,
        ScenarioKind::MapNoLock,
        ScenarioKind::MapPessimistic,
        ScenarioKind::MapOptimistic,
        ScenarioKind::AtomicLong,
    ];

    /// Scenario name as used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Memory => "memory",
            ScenarioKind::FileLock => "file-lock",
            ScenarioKind::LostUpdate => "lost-update",
            ScenarioKind::InPlace => "in-place",
            ScenarioKind::RowLocking => "row-locking",
            ScenarioKind::Serializable => "serializable",
            ScenarioKind::Optimistic => "optimistic",
            ScenarioKind::MapNoLock => "map-no-lock",
            ScenarioKind::MapPessimistic => "map-pessimistic",
            ScenarioKind::MapOptimistic => "map-optimistic",
            ScenarioKind::AtomicLong => "atomic-long",
        }
    }

    /// Backend this scenario runs against
    pub fn backend(&self) -> BackendKind {
        match self {
            ScenarioKind::Memory => BackendKind::Memory,
            ScenarioKind::FileLock => BackendKind::File,
            ScenarioKind::LostUpdate
            | ScenarioKind::InPlace
            | ScenarioKind::RowLocking
            | ScenarioKind::Serializable
            | ScenarioKind::Optimistic => BackendKind::Sql,
            ScenarioKind::MapNoLock | ScenarioKind::MapPessimistic | ScenarioKind::MapOptimistic => {
                BackendKind::Map
            }
            ScenarioKind::AtomicLong => BackendKind::Atomic,
        }
    }

    /// Whether the scenario promises exact totals
    pub fn correctness(&self) -> Correctness {
        match self {
            ScenarioKind::LostUpdate | ScenarioKind::MapNoLock => Correctness::Unsafe,
            _ => Correctness::Safe,
        }
    }

    /// Whether the scenario resolves conflicts with a retry loop
    pub fn retries(&self) -> bool {
        matches!(
            self,
            ScenarioKind::Serializable | ScenarioKind::Optimistic | ScenarioKind::MapOptimistic
        )
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::ConfigurationFault(format!("unknown scenario: {}", s)))
    }
}
