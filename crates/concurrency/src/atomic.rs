//! Linearizable atomic-reference scenario

use crate::strategy::{Increment, IncrementStrategy};
use tally_core::{Result, ScenarioKind};
use tally_storage::AtomicSession;

/// `atomic-long`: one `increment_and_get` per increment
///
/// There is no read-modify-write window to retry. Session loss handling
/// (redo or `SessionLost`) belongs to the session's redo policy.
pub struct AtomicLongStrategy<S> {
    session: S,
    name: String,
}

impl<S: AtomicSession> AtomicLongStrategy<S> {
    /// Increment reference `name` through `session`
    pub fn new(session: S, name: impl Into<String>) -> Self {
        Self {
            session,
            name: name.into(),
        }
    }
}

impl<S: AtomicSession> IncrementStrategy for AtomicLongStrategy<S> {
    fn scenario(&self) -> ScenarioKind {
        ScenarioKind::AtomicLong
    }

    fn increment(&mut self) -> Result<Increment> {
        self.session
            .increment_and_get(&self.name)
            .map(Increment::first_try)
    }
}
