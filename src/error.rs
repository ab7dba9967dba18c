//! Error types for Tally.
//!
//! Every layer shares one taxonomy, defined in `tally-core`; see
//! [`Error`] for how each variant is handled during a run.

pub use tally_core::{Error, Result};
