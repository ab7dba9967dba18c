//! Counter backends for Tally
//!
//! This crate implements the [`CounterStore`] contract over five substrates:
//! - [`MemoryCounter`]: mutex-guarded in-process cell
//! - [`FileCounter`]: text file under an exclusive advisory lock
//! - [`SqlCounter`]: one SQLite row, with per-worker [`SqlSession`]s
//! - [`MapCounter`]: one entry of a replicated map on the [`Grid`]
//! - [`AtomicLongCounter`]: a linearizable reference in the grid's CP group
//!
//! Backends know nothing about scenarios or load generation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;
pub mod grid;
pub mod memory;
pub mod sql;
pub mod traits;

pub use file::FileCounter;
pub use grid::{
    AtomicLongCounter, AtomicSession, ClientId, CpFault, CpGroup, Grid, GridAtomicSession,
    GridConfig, GridMapSession, MapCounter, MapKeyLock, MapSession, RedoPolicy,
};
pub use memory::MemoryCounter;
pub use sql::{LockMode, SqlCounter, SqlSession, SqlTransaction};
pub use traits::CounterStore;
