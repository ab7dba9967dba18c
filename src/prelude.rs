//! Convenient imports for Tally.
//!
//! ```ignore
//! use tally::prelude::*;
//!
//! let tally = Tally::builder().scenario(ScenarioKind::InPlace).open()?;
//! ```

// Main entry point
pub use crate::runner::{Tally, TallyBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Scenario vocabulary
pub use crate::types::{BackendKind, Correctness, ScenarioKind, TallyConfig};

// Running and reporting
pub use crate::types::{CounterStore, LoadGenerator, RunReport, Scenario, Verdict};
