//! The Counter Backend contract

use tally_core::{BackendKind, CounterState, Result};

/// Storage holding the one shared counter
///
/// Implementations own the counter exclusively; callers never cache it.
/// Every method opens whatever per-call resources it needs, so a store can
/// be shared freely across threads.
///
/// # Contract
///
/// - `prepare` is idempotent and safe to call concurrently; it creates the
///   backing row/entry/file with value 0 when absent and never resets an
///   existing value.
/// - `read` on an unreachable backend returns `BackendUnavailable`, never 0.
/// - `increment` is atomic with respect to other `increment` calls on the
///   same store.
pub trait CounterStore: Send + Sync {
    /// Which substrate this is
    fn kind(&self) -> BackendKind;

    /// Create the backing storage if absent
    fn prepare(&self) -> Result<()>;

    /// Authoritative read of the counter
    fn read(&self) -> Result<CounterState>;

    /// Atomically add one and return the new value
    fn increment(&self) -> Result<u64>;

    /// Overwrite the counter
    fn reset(&self, value: u64) -> Result<()>;
}
