//! Relational scenarios
//!
//! All five run on one [`SqlSession`] per worker and differ only in how the
//! read and the write of the counter row are fenced:
//!
//! | Scenario       | Fence                                              |
//! |----------------|----------------------------------------------------|
//! | `lost-update`  | none: two autocommit statements                    |
//! | `in-place`     | one `UPDATE … RETURNING` statement                 |
//! | `row-locking`  | `BEGIN IMMEDIATE` write lock before the read       |
//! | `serializable` | `BEGIN DEFERRED`; stale snapshot aborts the write  |
//! | `optimistic`   | version-predicated `UPDATE`, zero rows = conflict  |

use crate::retry::RetryPolicy;
use crate::strategy::{successor, think, Increment, IncrementStrategy};
use std::time::Duration;
use tally_core::{BackendKind, Error, Result, ScenarioKind};
use tally_storage::{LockMode, SqlSession};

/// Increment strategy for the relational backend
pub struct SqlStrategy {
    kind: ScenarioKind,
    session: SqlSession,
    policy: RetryPolicy,
    think_time: Option<Duration>,
}

impl SqlStrategy {
    /// Run `kind` on `session`
    pub fn new(
        kind: ScenarioKind,
        session: SqlSession,
        policy: RetryPolicy,
        think_time: Option<Duration>,
    ) -> Result<Self> {
        if kind.backend() != BackendKind::Sql {
            return Err(Error::ConfigurationFault(format!(
                "scenario {} does not run on the sql backend",
                kind
            )));
        }
        Ok(Self {
            kind,
            session,
            policy,
            think_time,
        })
    }

    fn attempt(&mut self) -> Result<u64> {
        match self.kind {
            ScenarioKind::LostUpdate => self.lost_update(),
            ScenarioKind::InPlace => self.session.increment_in_place(),
            ScenarioKind::RowLocking => self.in_transaction(LockMode::Immediate),
            ScenarioKind::Serializable => self.in_transaction(LockMode::Deferred),
            ScenarioKind::Optimistic => self.optimistic(),
            other => Err(Error::ConfigurationFault(format!(
                "scenario {} does not run on the sql backend",
                other
            ))),
        }
    }

    fn lost_update(&mut self) -> Result<u64> {
        let value = self.session.select_counter()?;
        think(self.think_time);
        let next = successor(value)?;
        self.session.write_counter(next)?;
        Ok(next)
    }

    /// SELECT, UPDATE and COMMIT in one transaction. Any error drops the
    /// transaction, which rolls it back.
    fn in_transaction(&mut self, mode: LockMode) -> Result<u64> {
        let think_time = self.think_time;
        let tx = self.session.transaction(mode)?;
        let value = tx.select_counter()?;
        think(think_time);
        let next = successor(value)?;
        tx.write_counter(next)?;
        tx.commit()?;
        Ok(next)
    }

    fn optimistic(&mut self) -> Result<u64> {
        let state = self.session.select_state()?;
        let version = state
            .version
            .ok_or_else(|| Error::Storage("counter row has no version".into()))?;
        think(self.think_time);
        let next = successor(state.value)?;
        if self.session.update_if_version(next, version)? {
            Ok(next)
        } else {
            Err(Error::TransientConflict(format!(
                "version {} changed before write",
                version
            )))
        }
    }
}

impl IncrementStrategy for SqlStrategy {
    fn scenario(&self) -> ScenarioKind {
        self.kind
    }

    fn increment(&mut self) -> Result<Increment> {
        let policy = self.policy;
        let out = policy.run(|| self.attempt())?;
        if out.retries > 0 {
            tracing::debug!(scenario = %self.kind, retries = out.retries, "increment retried");
        }
        Ok(Increment {
            value: out.value,
            retries: out.retries,
        })
    }
}
