//! Core types for Tally
//!
//! This crate defines what every other layer agrees on:
//! - [`Error`] / [`Result`]: the fault taxonomy
//! - [`CounterState`], [`ScenarioKind`], [`BackendKind`], [`Correctness`]
//! - [`TallyConfig`]: layered run configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{FileSettings, GridSettings, RetrySettings, SqlSettings, TallyConfig};
pub use error::{Error, Result};
pub use types::{BackendKind, Correctness, CounterState, ScenarioKind};
