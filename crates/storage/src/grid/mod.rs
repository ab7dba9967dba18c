//! Embedded coordination grid
//!
//! Distributed-map and atomic-primitive scenarios talk to their datastore
//! through two session traits:
//!
//! - [`MapSession`]: replicated map with get/put, per-key distributed locks
//!   and conditional replace
//! - [`AtomicSession`]: linearizable integer references
//!
//! [`Grid`] is the in-process implementation of both: a cluster member
//! embedded in the harness process. Map entries live in named partitions
//! (sharded by map name, as the storage layer shards by run); atomic
//! references live in a [`CpGroup`] that tracks client sessions and
//! deduplicates reissued invocations.
//!
//! # Fault hooks
//!
//! - [`Grid::set_online`]: take the whole cluster offline; every call then
//!   fails with `BackendUnavailable` and lock waiters wake up
//!
//! Key locks are leased to the map session that took them. An outage
//! expires every open map session and drops its locks, as a cluster drops
//! the locks of a client it lost; so does disconnecting the session.
//! - [`CpGroup::inject`]: make upcoming atomic calls lose their session
//!
//! # Latency
//!
//! [`GridConfig::latency`] adds a fixed sleep per call to simulate a network
//! round trip, which widens the race window of unguarded scenarios.

mod cp;
mod map;

pub use cp::{AtomicLongCounter, CpFault, CpGroup, GridAtomicSession, RedoPolicy};
pub use map::{GridMapSession, MapCounter, MapKeyLock};

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{Error, Result};

use map::MapPartition;

/// Client session of a replicated map
///
/// Each worker owns its own session. Lock ownership is per session: a key
/// locked by one session blocks writes and lock attempts from every other
/// session until it is unlocked.
pub trait MapSession: Send {
    /// Current value, `None` when the key is absent
    fn get(&self, map: &str, key: &str) -> Result<Option<u64>>;

    /// Store a value, returning the previous one
    fn put(&self, map: &str, key: &str, value: u64) -> Result<Option<u64>>;

    /// Store a value only if the key is absent, returning the existing one
    fn put_if_absent(&self, map: &str, key: &str, value: u64) -> Result<Option<u64>>;

    /// Acquire the distributed exclusive lock on a key
    ///
    /// Waits at most the configured lock timeout, then fails with
    /// `TransientConflict`.
    fn lock(&self, map: &str, key: &str) -> Result<()>;

    /// Release a lock held by this session
    fn unlock(&self, map: &str, key: &str) -> Result<()>;

    /// Replace the value only if it still equals `expected`
    fn replace_if_equals(&self, map: &str, key: &str, expected: u64, value: u64) -> Result<bool>;
}

/// Client session of a CP group's atomic references
pub trait AtomicSession: Send {
    /// Atomically add one and return the new value
    fn increment_and_get(&mut self, name: &str) -> Result<u64>;

    /// Current value (0 for a reference never written)
    fn get(&mut self, name: &str) -> Result<u64>;

    /// Overwrite the value
    fn set(&mut self, name: &str, value: u64) -> Result<()>;
}

/// Identity of a connected client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Grid tuning
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Longest wait for a distributed key lock or a locked key's write
    pub lock_timeout: Duration,
    /// Simulated round trip per call
    pub latency: Duration,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            latency: Duration::ZERO,
        }
    }
}

struct GridInner {
    config: GridConfig,
    online: AtomicBool,
    next_client: AtomicU64,
    epoch: AtomicU64,
    maps: DashMap<String, Arc<MapPartition>>,
    cp: CpGroup,
}

/// Embedded cluster member serving maps and atomic references
///
/// Cheap to clone; clones share the same cluster state.
#[derive(Clone)]
pub struct Grid {
    inner: Arc<GridInner>,
}

impl Grid {
    /// Start a grid
    pub fn new(config: GridConfig) -> Self {
        Self {
            inner: Arc::new(GridInner {
                config,
                online: AtomicBool::new(true),
                next_client: AtomicU64::new(1),
                epoch: AtomicU64::new(0),
                maps: DashMap::new(),
                cp: CpGroup::new(),
            }),
        }
    }

    /// Grid tuning
    pub fn config(&self) -> &GridConfig {
        &self.inner.config
    }

    /// Whether the cluster is reachable
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    /// Take the cluster offline or bring it back
    ///
    /// Going offline expires every open map session, releases all key
    /// locks and wakes every lock waiter so it can fail promptly.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::Release);
        if !online {
            self.inner.epoch.fetch_add(1, Ordering::AcqRel);
            for partition in self.inner.maps.iter() {
                partition.value().expire_locks();
            }
        }
        tracing::debug!(online, "grid availability changed");
    }

    /// CP group holding the atomic references
    pub fn cp(&self) -> &CpGroup {
        &self.inner.cp
    }

    /// Connect a new map session
    pub fn map_session(&self) -> Result<GridMapSession> {
        self.ensure_online()?;
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        Ok(GridMapSession::new(self.clone(), self.next_client(), epoch))
    }

    /// Connect a new CP session
    pub fn atomic_session(&self, redo: RedoPolicy) -> Result<GridAtomicSession> {
        self.ensure_online()?;
        Ok(GridAtomicSession::new(self.clone(), self.next_client(), redo))
    }

    fn next_client(&self) -> ClientId {
        ClientId(self.inner.next_client.fetch_add(1, Ordering::Relaxed))
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(Error::BackendUnavailable("grid cluster unreachable".into()))
        }
    }

    /// Fail unless the cluster is up and has not restarted since `epoch`
    fn ensure_session(&self, epoch: u64, client: ClientId) -> Result<()> {
        self.ensure_online()?;
        if self.inner.epoch.load(Ordering::Acquire) != epoch {
            return Err(Error::BackendUnavailable(format!(
                "{} expired by a cluster outage",
                client
            )));
        }
        Ok(())
    }

    /// Drop every key lock `client` holds
    fn release_locks_of(&self, client: ClientId) {
        for partition in self.inner.maps.iter() {
            partition.value().release_all(client);
        }
    }

    /// One simulated network round trip
    fn round_trip(&self) -> Result<()> {
        self.ensure_online()?;
        let latency = self.inner.config.latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        self.ensure_online()
    }

    fn partition(&self, map: &str) -> Arc<MapPartition> {
        if let Some(p) = self.inner.maps.get(map) {
            return Arc::clone(p.value());
        }
        Arc::clone(
            self.inner
                .maps
                .entry(map.to_string())
                .or_insert_with(|| Arc::new(MapPartition::new()))
                .value(),
        )
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("online", &self.is_online())
            .field("maps", &self.inner.maps.len())
            .finish()
    }
}
