//! Replicated map partitions, map sessions and the map-entry counter

use super::{ClientId, Grid, MapSession};
use crate::traits::CounterStore;
use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use std::time::Instant;
use tally_core::{BackendKind, CounterState, Error, Result};

#[derive(Default)]
struct PartitionState {
    entries: FxHashMap<String, u64>,
    locks: FxHashMap<String, ClientId>,
}

impl PartitionState {
    fn locked_by_other(&self, key: &str, client: ClientId) -> bool {
        matches!(self.locks.get(key), Some(owner) if *owner != client)
    }
}

/// One named map: entries plus the key-lock table
///
/// Entries and locks share a mutex so a write can check lock ownership and
/// apply atomically. Waiters park on `released`.
pub(super) struct MapPartition {
    state: Mutex<PartitionState>,
    released: Condvar,
}

impl MapPartition {
    pub(super) fn new() -> Self {
        Self {
            state: Mutex::new(PartitionState::default()),
            released: Condvar::new(),
        }
    }

    /// Drop every key lock and wake every waiter. Taking the mutex first
    /// means no waiter is between its availability check and parking.
    pub(super) fn expire_locks(&self) {
        let mut state = self.state.lock();
        state.locks.clear();
        self.released.notify_all();
    }

    /// Drop the key locks held by `client`
    pub(super) fn release_all(&self, client: ClientId) {
        let mut state = self.state.lock();
        let before = state.locks.len();
        state.locks.retain(|_, owner| *owner != client);
        if state.locks.len() != before {
            self.released.notify_all();
        }
    }

    /// Lock the partition once `key` is not locked by another client
    fn acquire_for(
        &self,
        session: &GridMapSession,
        key: &str,
    ) -> Result<MutexGuard<'_, PartitionState>> {
        let grid = &session.grid;
        let client = session.client;
        let deadline = Instant::now() + grid.config().lock_timeout;
        let mut state = self.state.lock();
        while state.locked_by_other(key, client) {
            session.ensure_current()?;
            if self.released.wait_until(&mut state, deadline).timed_out()
                && state.locked_by_other(key, client)
            {
                return Err(Error::TransientConflict(format!(
                    "key {:?} still locked after {:?}",
                    key,
                    grid.config().lock_timeout
                )));
            }
        }
        session.ensure_current()?;
        Ok(state)
    }
}

/// Map session connected to an embedded [`Grid`]
///
/// The session holds the lease on its key locks: a cluster outage expires
/// it, and dropping it releases whatever it still has locked.
pub struct GridMapSession {
    grid: Grid,
    client: ClientId,
    epoch: u64,
}

impl GridMapSession {
    pub(super) fn new(grid: Grid, client: ClientId, epoch: u64) -> Self {
        Self {
            grid,
            client,
            epoch,
        }
    }

    /// Identity used for lock ownership
    pub fn client_id(&self) -> ClientId {
        self.client
    }

    fn ensure_current(&self) -> Result<()> {
        self.grid.ensure_session(self.epoch, self.client)
    }

    fn round_trip(&self) -> Result<()> {
        self.grid.round_trip()?;
        self.ensure_current()
    }
}

impl Drop for GridMapSession {
    fn drop(&mut self) {
        self.grid.release_locks_of(self.client);
    }
}

impl MapSession for GridMapSession {
    fn get(&self, map: &str, key: &str) -> Result<Option<u64>> {
        self.round_trip()?;
        let partition = self.grid.partition(map);
        let state = partition.state.lock();
        Ok(state.entries.get(key).copied())
    }

    fn put(&self, map: &str, key: &str, value: u64) -> Result<Option<u64>> {
        self.round_trip()?;
        let partition = self.grid.partition(map);
        let mut state = partition.acquire_for(self, key)?;
        Ok(state.entries.insert(key.to_string(), value))
    }

    fn put_if_absent(&self, map: &str, key: &str, value: u64) -> Result<Option<u64>> {
        self.round_trip()?;
        let partition = self.grid.partition(map);
        let mut state = partition.acquire_for(self, key)?;
        if let Some(existing) = state.entries.get(key) {
            return Ok(Some(*existing));
        }
        state.entries.insert(key.to_string(), value);
        Ok(None)
    }

    fn lock(&self, map: &str, key: &str) -> Result<()> {
        self.round_trip()?;
        let partition = self.grid.partition(map);
        let mut state = partition.acquire_for(self, key)?;
        state.locks.insert(key.to_string(), self.client);
        Ok(())
    }

    fn unlock(&self, map: &str, key: &str) -> Result<()> {
        self.round_trip()?;
        let partition = self.grid.partition(map);
        let mut state = partition.state.lock();
        match state.locks.get(key) {
            Some(owner) if *owner == self.client => {
                state.locks.remove(key);
                drop(state);
                partition.released.notify_all();
                Ok(())
            }
            Some(owner) => Err(Error::Storage(format!(
                "{} cannot unlock {:?}: held by {}",
                self.client, key, owner
            ))),
            None => Err(Error::Storage(format!(
                "{} cannot unlock {:?}: not locked",
                self.client, key
            ))),
        }
    }

    fn replace_if_equals(&self, map: &str, key: &str, expected: u64, value: u64) -> Result<bool> {
        self.round_trip()?;
        let partition = self.grid.partition(map);
        let mut state = partition.acquire_for(self, key)?;
        match state.entries.get_mut(key) {
            Some(current) if *current == expected => {
                *current = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Held distributed key lock
///
/// Unlocks on drop, so the lock is released on every exit path of the
/// critical section, including early returns with `?`. Call
/// [`MapKeyLock::release`] to observe the unlock result. An unlock that
/// cannot reach the cluster is covered by the session lease.
pub struct MapKeyLock<'a, S: MapSession + ?Sized> {
    session: &'a S,
    map: &'a str,
    key: &'a str,
    held: bool,
}

impl<'a, S: MapSession + ?Sized> MapKeyLock<'a, S> {
    /// Lock `key` through `session`
    pub fn acquire(session: &'a S, map: &'a str, key: &'a str) -> Result<Self> {
        session.lock(map, key)?;
        Ok(Self {
            session,
            map,
            key,
            held: true,
        })
    }

    /// Unlock now and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.held = false;
        self.session.unlock(self.map, self.key)
    }
}

impl<S: MapSession + ?Sized> Drop for MapKeyLock<'_, S> {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.session.unlock(self.map, self.key) {
                tracing::warn!(map = self.map, key = self.key, error = %e, "unlock on drop failed");
            }
        }
    }
}

/// Counter stored as one map entry
#[derive(Debug, Clone)]
pub struct MapCounter {
    grid: Grid,
    map: String,
    key: String,
}

impl MapCounter {
    /// Entry `key` of map `map` on `grid`
    pub fn new(grid: Grid, map: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            grid,
            map: map.into(),
            key: key.into(),
        }
    }

    /// Map name
    pub fn map(&self) -> &str {
        &self.map
    }

    /// Entry key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Connect a new session for one worker
    pub fn session(&self) -> Result<GridMapSession> {
        self.grid.map_session()
    }
}

impl CounterStore for MapCounter {
    fn kind(&self) -> BackendKind {
        BackendKind::Map
    }

    fn prepare(&self) -> Result<()> {
        self.session()?.put_if_absent(&self.map, &self.key, 0)?;
        Ok(())
    }

    /// An absent entry reads as 0; an unreachable grid is an error.
    fn read(&self) -> Result<CounterState> {
        let value = self.session()?.get(&self.map, &self.key)?;
        Ok(CounterState::new(value.unwrap_or(0)))
    }

    fn increment(&self) -> Result<u64> {
        let session = self.session()?;
        let lock = MapKeyLock::acquire(&session, &self.map, &self.key)?;
        let next = session
            .get(&self.map, &self.key)?
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| Error::Storage("counter overflow".into()))?;
        session.put(&self.map, &self.key, next)?;
        if let Err(e) = lock.release() {
            tracing::warn!(map = %self.map, key = %self.key, error = %e, "unlock after write failed");
        }
        Ok(next)
    }

    fn reset(&self, value: u64) -> Result<()> {
        self.session()?.put(&self.map, &self.key, value)?;
        Ok(())
    }
}
