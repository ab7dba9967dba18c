//! CP group: linearizable atomic references with session deduplication
//!
//! Every client session numbers its invocations. The group remembers the
//! last invocation it applied per session together with its result, so a
//! reissued invocation (same session, same sequence number) is answered from
//! that record instead of being applied twice. This is what makes a client
//! "redo" safe after a lost reply.
//!
//! ```text
//! client                         group
//!   | increment_and_get(s, 7) ---> |  apply, remember (s, 7) -> 42
//!   |        x reply lost x <----- |
//!   | increment_and_get(s, 7) ---> |  seen (s, 7): answer 42, no apply
//!   | <-------------- 42 --------- |
//! ```

use super::{AtomicSession, ClientId, Grid};
use crate::traits::CounterStore;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tally_core::{BackendKind, CounterState, Error, Result};

/// Injected failure for an upcoming `increment_and_get`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpFault {
    /// Applied, but the reply never reaches the client
    DropResponse,
    /// Session expired before the invocation was applied
    ExpireSession,
}

#[derive(Debug, Clone, Copy)]
struct LastInvocation {
    seq: u64,
    result: u64,
}

#[derive(Default)]
struct CpState {
    values: FxHashMap<String, u64>,
    sessions: FxHashMap<ClientId, LastInvocation>,
    faults: VecDeque<CpFault>,
    applied: u64,
}

/// Why an invocation did not produce a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lost {
    Expired,
    Dropped,
}

/// Consensus-backed group holding atomic references
#[derive(Default)]
pub struct CpGroup {
    state: Mutex<CpState>,
}

impl CpGroup {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` increment invocations fail with `fault`
    ///
    /// Faults are consumed in order, one per invocation reaching the group,
    /// reissues included.
    pub fn inject(&self, fault: CpFault, count: usize) {
        let mut state = self.state.lock();
        state.faults.extend(std::iter::repeat(fault).take(count));
    }

    /// Faults not yet consumed
    pub fn pending_faults(&self) -> usize {
        self.state.lock().faults.len()
    }

    /// Increments actually applied, across all references
    pub fn applied_increments(&self) -> u64 {
        self.state.lock().applied
    }

    /// Outer error: the invocation reached the group and failed there.
    /// Inner error: no reply reached the client.
    fn increment(
        &self,
        client: ClientId,
        seq: u64,
        name: &str,
    ) -> Result<std::result::Result<u64, Lost>> {
        let mut state = self.state.lock();
        let fault = state.faults.pop_front();
        if fault == Some(CpFault::ExpireSession) {
            return Ok(Err(Lost::Expired));
        }

        let result = match state.sessions.get(&client) {
            Some(last) if last.seq == seq => last.result,
            _ => {
                let value = state.values.entry(name.to_string()).or_insert(0);
                let result = value
                    .checked_add(1)
                    .ok_or_else(|| Error::Storage("counter overflow".into()))?;
                *value = result;
                state.applied += 1;
                state.sessions.insert(client, LastInvocation { seq, result });
                result
            }
        };

        match fault {
            Some(CpFault::DropResponse) => Ok(Err(Lost::Dropped)),
            _ => Ok(Ok(result)),
        }
    }

    fn get(&self, name: &str) -> u64 {
        self.state.lock().values.get(name).copied().unwrap_or(0)
    }

    fn set(&self, name: &str, value: u64) {
        self.state.lock().values.insert(name.to_string(), value);
    }

    fn ensure(&self, name: &str) {
        self.state.lock().values.entry(name.to_string()).or_insert(0);
    }
}

/// Client-side handling of session loss during an atomic call
///
/// With `enabled`, a lost invocation is reissued under the same sequence
/// number up to `max_redos` times, sleeping `backoff` before each reissue;
/// the group's deduplication keeps the net effect at one increment. When
/// disabled or exhausted, the caller gets `SessionLost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedoPolicy {
    /// Reissue lost invocations
    pub enabled: bool,
    /// Reissues allowed per invocation
    pub max_redos: u32,
    /// Pause before each reissue
    pub backoff: Duration,
}

impl RedoPolicy {
    /// Surface every session loss to the caller
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_redos: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Reissue up to `max_redos` times
    pub fn enabled(max_redos: u32, backoff: Duration) -> Self {
        Self {
            enabled: true,
            max_redos,
            backoff,
        }
    }
}

impl Default for RedoPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// CP session connected to an embedded [`Grid`]
pub struct GridAtomicSession {
    grid: Grid,
    client: ClientId,
    redo: RedoPolicy,
    next_seq: u64,
}

impl GridAtomicSession {
    pub(super) fn new(grid: Grid, client: ClientId, redo: RedoPolicy) -> Self {
        Self {
            grid,
            client,
            redo,
            next_seq: 1,
        }
    }

    /// Session identity used for deduplication
    pub fn client_id(&self) -> ClientId {
        self.client
    }

    /// Redo policy in force
    pub fn redo_policy(&self) -> RedoPolicy {
        self.redo
    }
}

impl AtomicSession for GridAtomicSession {
    fn increment_and_get(&mut self, name: &str) -> Result<u64> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let mut redos = 0;
        loop {
            self.grid.round_trip()?;
            match self.grid.cp().increment(self.client, seq, name)? {
                Ok(value) => return Ok(value),
                Err(lost) => {
                    if !self.redo.enabled || redos >= self.redo.max_redos {
                        tracing::debug!(client = %self.client, seq, ?lost, redos, "session lost");
                        return Err(Error::SessionLost { redos });
                    }
                    redos += 1;
                    tracing::debug!(client = %self.client, seq, ?lost, redos, "redoing invocation");
                    if !self.redo.backoff.is_zero() {
                        std::thread::sleep(self.redo.backoff);
                    }
                }
            }
        }
    }

    fn get(&mut self, name: &str) -> Result<u64> {
        self.grid.round_trip()?;
        Ok(self.grid.cp().get(name))
    }

    fn set(&mut self, name: &str, value: u64) -> Result<()> {
        self.grid.round_trip()?;
        self.grid.cp().set(name, value);
        Ok(())
    }
}

/// Counter held in a CP atomic reference
#[derive(Debug, Clone)]
pub struct AtomicLongCounter {
    grid: Grid,
    name: String,
    redo: RedoPolicy,
}

impl AtomicLongCounter {
    /// Reference `name` on `grid`
    pub fn new(grid: Grid, name: impl Into<String>, redo: RedoPolicy) -> Self {
        Self {
            grid,
            name: name.into(),
            redo,
        }
    }

    /// Reference name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Redo policy handed to new sessions
    pub fn redo_policy(&self) -> RedoPolicy {
        self.redo
    }

    /// Grid the reference lives on
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Connect a new session for one worker
    pub fn session(&self) -> Result<GridAtomicSession> {
        self.grid.atomic_session(self.redo)
    }
}

impl CounterStore for AtomicLongCounter {
    fn kind(&self) -> BackendKind {
        BackendKind::Atomic
    }

    fn prepare(&self) -> Result<()> {
        self.grid.round_trip()?;
        self.grid.cp().ensure(&self.name);
        Ok(())
    }

    fn read(&self) -> Result<CounterState> {
        Ok(CounterState::new(self.session()?.get(&self.name)?))
    }

    fn increment(&self) -> Result<u64> {
        self.session()?.increment_and_get(&self.name)
    }

    fn reset(&self, value: u64) -> Result<()> {
        self.session()?.set(&self.name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(redo: RedoPolicy) -> AtomicLongCounter {
        let counter = AtomicLongCounter::new(Grid::default(), "counter-long", redo);
        counter.prepare().unwrap();
        counter
    }

    #[test]
    fn increment_and_get_is_sequential() {
        let c = counter(RedoPolicy::disabled());
        let mut s = c.session().unwrap();
        assert_eq!(s.increment_and_get("counter-long").unwrap(), 1);
        assert_eq!(s.increment_and_get("counter-long").unwrap(), 2);
        assert_eq!(c.read().unwrap().value, 2);
    }

    #[test]
    fn dropped_reply_without_redo_surfaces_session_lost() {
        let c = counter(RedoPolicy::disabled());
        let mut s = c.session().unwrap();
        c.grid().cp().inject(CpFault::DropResponse, 1);

        let err = s.increment_and_get("counter-long").unwrap_err();
        assert!(matches!(err, Error::SessionLost { redos: 0 }));
        // The group applied it even though the client never heard back.
        assert_eq!(c.read().unwrap().value, 1);
    }

    #[test]
    fn dropped_reply_with_redo_counts_once() {
        let c = counter(RedoPolicy::enabled(3, Duration::ZERO));
        let mut s = c.session().unwrap();
        c.grid().cp().inject(CpFault::DropResponse, 2);

        assert_eq!(s.increment_and_get("counter-long").unwrap(), 1);
        assert_eq!(c.read().unwrap().value, 1);
        assert_eq!(c.grid().cp().applied_increments(), 1);
        assert_eq!(c.grid().cp().pending_faults(), 0);
    }

    #[test]
    fn expired_session_with_redo_applies_once() {
        let c = counter(RedoPolicy::enabled(3, Duration::ZERO));
        let mut s = c.session().unwrap();
        c.grid().cp().inject(CpFault::ExpireSession, 1);

        assert_eq!(s.increment_and_get("counter-long").unwrap(), 1);
        assert_eq!(c.read().unwrap().value, 1);
    }

    #[test]
    fn expired_session_without_redo_applies_nothing() {
        let c = counter(RedoPolicy::disabled());
        let mut s = c.session().unwrap();
        c.grid().cp().inject(CpFault::ExpireSession, 1);

        assert!(s.increment_and_get("counter-long").is_err());
        assert_eq!(c.read().unwrap().value, 0);
    }

    #[test]
    fn redo_budget_is_bounded() {
        let c = counter(RedoPolicy::enabled(2, Duration::ZERO));
        let mut s = c.session().unwrap();
        c.grid().cp().inject(CpFault::ExpireSession, 5);

        let err = s.increment_and_get("counter-long").unwrap_err();
        assert!(matches!(err, Error::SessionLost { redos: 2 }));
        assert_eq!(c.grid().cp().pending_faults(), 2);
    }

    #[test]
    fn next_invocation_is_not_deduplicated() {
        let c = counter(RedoPolicy::enabled(1, Duration::ZERO));
        let mut s = c.session().unwrap();
        c.grid().cp().inject(CpFault::DropResponse, 1);
        assert_eq!(s.increment_and_get("counter-long").unwrap(), 1);
        assert_eq!(s.increment_and_get("counter-long").unwrap(), 2);
    }

    #[test]
    fn offline_grid_is_unavailable() {
        let c = counter(RedoPolicy::enabled(3, Duration::ZERO));
        let mut s = c.session().unwrap();
        c.grid().set_online(false);
        assert!(matches!(
            s.increment_and_get("counter-long"),
            Err(Error::BackendUnavailable(_))
        ));
        assert!(matches!(c.read(), Err(Error::BackendUnavailable(_))));
    }

    #[test]
    fn overflow_is_storage_error() {
        let c = counter(RedoPolicy::disabled());
        c.reset(u64::MAX).unwrap();
        assert!(matches!(c.increment(), Err(Error::Storage(_))));
        assert_eq!(c.read().unwrap().value, u64::MAX);
        assert_eq!(c.grid().cp().applied_increments(), 0);
    }

    #[test]
    fn reset_overwrites() {
        let c = counter(RedoPolicy::disabled());
        c.increment().unwrap();
        c.reset(10).unwrap();
        assert_eq!(c.increment().unwrap(), 11);
    }
}
