//! Error taxonomy for counter operations.
//!
//! Every fault a backend or strategy can raise is classified into one of a
//! small number of variants. The classification drives what happens next:
//!
//! | Variant | Raised by | Handling |
//! |---------|-----------|----------|
//! | `BackendUnavailable` | connection refused, cluster offline | fatal to the worker |
//! | `TransientConflict` | lock contention, serialization failure, CAS mismatch | retried inside the strategy |
//! | `RetryBudgetExhausted` | retry loop hit its cap | one failed iteration |
//! | `ConfigurationFault` | missing or unprepared store, bad config | fatal at startup |
//! | `SessionLost` | atomic call lost its session, not reissued | failed, possibly applied |
//! | `Storage` / `Io` | corrupt value, unexpected datastore error | one failed iteration |

use thiserror::Error;

/// All Tally errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The datastore or coordination cluster cannot be reached
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Contention the caller may resolve by retrying with fresh data
    #[error("transient conflict: {0}")]
    TransientConflict(String),

    /// A bounded retry loop gave up
    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetryBudgetExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Description of the last conflict seen
        last: String,
    },

    /// The backing store is missing, unprepared or misconfigured
    #[error("configuration fault: {0}")]
    ConfigurationFault(String),

    /// A linearizable call lost its session and was not reissued
    ///
    /// The operation may or may not have been applied.
    #[error("session lost after {redos} redo(s)")]
    SessionLost {
        /// Reissues attempted before giving up
        redos: u32,
    },

    /// Stored state is corrupt or the datastore failed unexpectedly
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Tally operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Only transient conflicts may succeed on retry with fresh data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientConflict(_))
    }

    /// Check if this error ends a worker's run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BackendUnavailable(_) | Error::ConfigurationFault(_)
        )
    }

    /// Check if the failed operation may still have been applied.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Error::SessionLost { .. })
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::BackendUnavailable(_) => "BackendUnavailable",
            Error::TransientConflict(_) => "TransientConflict",
            Error::RetryBudgetExhausted { .. } => "RetryBudgetExhausted",
            Error::ConfigurationFault(_) => "ConfigurationFault",
            Error::SessionLost { .. } => "SessionLost",
            Error::Storage(_) => "Storage",
            Error::Io(_) => "Io",
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigurationFault(format!("invalid config: {}", e))
    }
}
