//! The per-worker increment contract

use std::thread;
use std::time::Duration;
use tally_core::{Error, Result, ScenarioKind};

/// Outcome of one successful increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    /// Counter value this increment produced
    pub value: u64,
    /// Attempts beyond the first that the strategy needed
    pub retries: u32,
}

impl Increment {
    /// Increment that succeeded on its first attempt
    pub fn first_try(value: u64) -> Self {
        Self { value, retries: 0 }
    }
}

/// One worker's handle for incrementing the shared counter
///
/// A strategy owns its worker's session (connection, grid client, CP
/// session) and is never shared between threads. `TransientConflict`s are
/// resolved inside `increment`; they only reach the caller wrapped in
/// `RetryBudgetExhausted`.
pub trait IncrementStrategy: Send {
    /// Scenario this strategy runs
    fn scenario(&self) -> ScenarioKind;

    /// Perform one logical increment
    fn increment(&mut self) -> Result<Increment>;
}

impl<S: IncrementStrategy + ?Sized> IncrementStrategy for Box<S> {
    fn scenario(&self) -> ScenarioKind {
        (**self).scenario()
    }

    fn increment(&mut self) -> Result<Increment> {
        (**self).increment()
    }
}

/// Pause between read and write, if configured
pub(crate) fn think(think_time: Option<Duration>) {
    if let Some(pause) = think_time {
        thread::sleep(pause);
    }
}

/// `value + 1`, or a storage fault at the top of the range
pub(crate) fn successor(value: u64) -> Result<u64> {
    value
        .checked_add(1)
        .ok_or_else(|| Error::Storage("counter overflow".into()))
}
