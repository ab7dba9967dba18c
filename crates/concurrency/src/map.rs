//! Distributed-map scenarios

use crate::retry::RetryPolicy;
use crate::strategy::{successor, think, Increment, IncrementStrategy};
use std::time::Duration;
use tally_core::{BackendKind, Error, Result, ScenarioKind};
use tally_storage::{MapKeyLock, MapSession};

/// Increment strategy for one entry of a replicated map
///
/// - `map-no-lock`: get, add one, put. Concurrent workers overwrite each
///   other.
/// - `map-pessimistic`: the same cycle under the key's distributed lock.
///   The lock guard unlocks on every exit path. Once the put has applied
///   the increment counts, even if the unlock then fails.
/// - `map-optimistic`: get, then `replace_if_equals`; a mismatch is a
///   conflict and the cycle is retried. An absent entry is claimed with
///   `put_if_absent`.
pub struct MapStrategy<S> {
    kind: ScenarioKind,
    session: S,
    map: String,
    key: String,
    policy: RetryPolicy,
    think_time: Option<Duration>,
}

impl<S: MapSession> MapStrategy<S> {
    /// Run `kind` against `map[key]` through `session`
    pub fn new(
        kind: ScenarioKind,
        session: S,
        map: impl Into<String>,
        key: impl Into<String>,
        policy: RetryPolicy,
        think_time: Option<Duration>,
    ) -> Result<Self> {
        if kind.backend() != BackendKind::Map {
            return Err(Error::ConfigurationFault(format!(
                "scenario {} does not run on the map backend",
                kind
            )));
        }
        Ok(Self {
            kind,
            session,
            map: map.into(),
            key: key.into(),
            policy,
            think_time,
        })
    }

    fn attempt(&self) -> Result<u64> {
        match self.kind {
            ScenarioKind::MapNoLock => self.read_then_put(),
            ScenarioKind::MapPessimistic => {
                let lock = MapKeyLock::acquire(&self.session, &self.map, &self.key)?;
                let next = self.read_then_put()?;
                // The put has applied; a failed unlock is left to the lease.
                if let Err(e) = lock.release() {
                    tracing::warn!(map = %self.map, key = %self.key, error = %e, "unlock after write failed");
                }
                Ok(next)
            }
            ScenarioKind::MapOptimistic => self.compare_and_replace(),
            other => Err(Error::ConfigurationFault(format!(
                "scenario {} does not run on the map backend",
                other
            ))),
        }
    }

    fn read_then_put(&self) -> Result<u64> {
        let value = self.session.get(&self.map, &self.key)?.unwrap_or(0);
        think(self.think_time);
        let next = successor(value)?;
        self.session.put(&self.map, &self.key, next)?;
        Ok(next)
    }

    fn compare_and_replace(&self) -> Result<u64> {
        match self.session.get(&self.map, &self.key)? {
            Some(value) => {
                think(self.think_time);
                let next = successor(value)?;
                if self
                    .session
                    .replace_if_equals(&self.map, &self.key, value, next)?
                {
                    Ok(next)
                } else {
                    Err(Error::TransientConflict(format!(
                        "{}[{}] changed from {}",
                        self.map, self.key, value
                    )))
                }
            }
            None => match self.session.put_if_absent(&self.map, &self.key, 1)? {
                None => Ok(1),
                Some(_) => Err(Error::TransientConflict(format!(
                    "{}[{}] created concurrently",
                    self.map, self.key
                ))),
            },
        }
    }
}

impl<S: MapSession> IncrementStrategy for MapStrategy<S> {
    fn scenario(&self) -> ScenarioKind {
        self.kind
    }

    fn increment(&mut self) -> Result<Increment> {
        let out = self.policy.run(|| self.attempt())?;
        if out.retries > 0 {
            tracing::debug!(scenario = %self.kind, retries = out.retries, "increment retried");
        }
        Ok(Increment {
            value: out.value,
            retries: out.retries,
        })
    }
}
