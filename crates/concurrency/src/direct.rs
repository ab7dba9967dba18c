//! Scenarios that delegate straight to the store

use crate::retry::RetryPolicy;
use crate::strategy::{Increment, IncrementStrategy};
use tally_core::{Error, Result, ScenarioKind};
use tally_storage::CounterStore;

/// `memory` and `file-lock`: the store's own atomic increment
///
/// The store serializes the increment itself (a mutex, an exclusive file
/// lock). A file lock wait that times out is retried under `policy`.
pub struct DirectStrategy<C> {
    kind: ScenarioKind,
    store: C,
    policy: RetryPolicy,
}

impl<C: CounterStore> DirectStrategy<C> {
    /// Run `kind` on `store`
    pub fn new(kind: ScenarioKind, store: C, policy: RetryPolicy) -> Result<Self> {
        if kind.backend() != store.kind() {
            return Err(Error::ConfigurationFault(format!(
                "scenario {} does not run on the {} backend",
                kind,
                store.kind()
            )));
        }
        Ok(Self {
            kind,
            store,
            policy,
        })
    }
}

impl<C: CounterStore> IncrementStrategy for DirectStrategy<C> {
    fn scenario(&self) -> ScenarioKind {
        self.kind
    }

    fn increment(&mut self) -> Result<Increment> {
        let out = self.policy.run(|| self.store.increment())?;
        Ok(Increment {
            value: out.value,
            retries: out.retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_storage::{FileCounter, MemoryCounter};
    use tempfile::TempDir;

    #[test]
    fn memory_increments() {
        let store = MemoryCounter::with_value(41);
        let mut s = DirectStrategy::new(ScenarioKind::Memory, store.clone(), RetryPolicy::none())
            .unwrap();
        assert_eq!(s.increment().unwrap().value, 42);
        assert_eq!(store.read().unwrap().value, 42);
    }

    #[test]
    fn file_lock_increments() {
        let dir = TempDir::new().unwrap();
        let store = FileCounter::new(dir.path().join("counter.txt"));
        store.prepare().unwrap();
        let mut s =
            DirectStrategy::new(ScenarioKind::FileLock, store.clone(), RetryPolicy::default())
                .unwrap();
        for i in 1..=5 {
            assert_eq!(s.increment().unwrap().value, i);
        }
        assert_eq!(store.read().unwrap().value, 5);
    }

    #[test]
    fn backend_mismatch_is_rejected() {
        let result = DirectStrategy::new(
            ScenarioKind::FileLock,
            MemoryCounter::new(),
            RetryPolicy::none(),
        );
        assert!(matches!(result, Err(Error::ConfigurationFault(_))));
    }
}
