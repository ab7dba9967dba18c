//! Load generation and consistency reporting for Tally
//!
//! [`LoadGenerator`] starts W workers on a shared barrier, has each perform
//! R increments through its own strategy, and assembles a [`RunReport`].
//! [`ConsistencyReport`] checks the final value against the scenario's
//! promise.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod generator;
pub mod report;

pub use generator::{LoadGenerator, RunPhase, RunReport, WorkerResult};
pub use report::{ConsistencyReport, Guarantee, Verdict};
