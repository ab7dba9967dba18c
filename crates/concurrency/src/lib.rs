//! Scenario strategies for Tally
//!
//! A scenario is one way of incrementing the shared counter under
//! concurrency. Each worker gets its own [`IncrementStrategy`] from
//! [`Scenario::connect`], owning its own session to the backend:
//!
//! - [`SqlStrategy`]: lost-update, in-place, row-locking, serializable,
//!   optimistic
//! - [`MapStrategy`]: map-no-lock, map-pessimistic, map-optimistic
//! - [`AtomicLongStrategy`]: atomic-long
//! - [`DirectStrategy`]: memory, file-lock
//!
//! # Conflicts
//!
//! Optimistic and serializable strategies detect conflicts and re-run their
//! whole cycle under a [`RetryPolicy`]. The same loop absorbs lock-wait
//! timeouts in the locking strategies. A conflict never escapes a strategy
//! except as `RetryBudgetExhausted`.
//!
//! # Thread Safety
//!
//! Strategies are `Send` but not shared: one per worker thread.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod direct;
pub mod map;
pub mod retry;
pub mod scenario;
pub mod sql;
pub mod strategy;

pub use atomic::AtomicLongStrategy;
pub use direct::DirectStrategy;
pub use map::MapStrategy;
pub use retry::{Attempted, RetryPolicy};
pub use scenario::{grid_config, redo_policy, Scenario, Target};
pub use sql::SqlStrategy;
pub use strategy::{Increment, IncrementStrategy};
