//! In-process counter cell

use crate::traits::CounterStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tally_core::{BackendKind, CounterState, Error, Result};

/// Counter held in process memory behind a mutex
///
/// Clones share the same cell. Increments are fully serialized by the lock,
/// so this backend is always correct and only measures lock overhead.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounter {
    cell: Arc<Mutex<u64>>,
}

impl MemoryCounter {
    /// Create a counter starting at 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter starting at `value`
    pub fn with_value(value: u64) -> Self {
        Self {
            cell: Arc::new(Mutex::new(value)),
        }
    }
}

impl CounterStore for MemoryCounter {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    fn read(&self) -> Result<CounterState> {
        Ok(CounterState::new(*self.cell.lock()))
    }

    fn increment(&self) -> Result<u64> {
        let mut value = self.cell.lock();
        *value = value
            .checked_add(1)
            .ok_or_else(|| Error::Storage("counter overflow".into()))?;
        Ok(*value)
    }

    fn reset(&self, value: u64) -> Result<()> {
        *self.cell.lock() = value;
        Ok(())
    }
}
