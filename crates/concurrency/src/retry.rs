//! Bounded retry loop
//!
//! Optimistic and serializable strategies resolve conflicts by re-running
//! their whole read-compute-write cycle. [`RetryPolicy::run`] is that loop:
//! it retries only `TransientConflict`, backs off exponentially with jitter
//! between attempts, and gives up with `RetryBudgetExhausted` once
//! `max_attempts` is spent. Any other error passes straight through.

use rand::Rng;
use std::thread;
use std::time::Duration;
use tally_core::{Error, Result, RetrySettings};

/// Retry budget and backoff shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per operation, including the first (at least 1)
    pub max_attempts: u32,
    /// Backoff before the first retry
    pub base_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
}

/// Successful outcome of a retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempted<T> {
    /// What the final attempt returned
    pub value: T,
    /// Attempts beyond the first
    pub retries: u32,
}

impl RetryPolicy {
    /// Policy with the given budget and backoff
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Backoff before retry number `retry` (1-based), jittered into
    /// `[d/2, d]` where `d = min(base * 2^(retry-1), max)`
    pub fn backoff(&self, retry: u32) -> Duration {
        if self.base_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        let ceiling = self.base_backoff.saturating_mul(factor).min(self.max_backoff);
        let ceiling_ns = ceiling.as_nanos() as u64;
        let jittered = rand::thread_rng().gen_range(ceiling_ns / 2..=ceiling_ns);
        Duration::from_nanos(jittered)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// budget is spent
    pub fn run<T, F>(&self, mut op: F) -> Result<Attempted<T>>
    where
        F: FnMut() -> Result<T>,
    {
        let mut last = String::new();
        for attempt in 1..=self.max_attempts {
            match op() {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        retries: attempt - 1,
                    })
                }
                Err(e) if e.is_retryable() => {
                    last = e.to_string();
                    if attempt < self.max_attempts {
                        let pause = self.backoff(attempt);
                        tracing::trace!(attempt, ?pause, error = %last, "retrying");
                        if !pause.is_zero() {
                            thread::sleep(pause);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(attempts = self.max_attempts, error = %last, "retry budget exhausted");
        Err(Error::RetryBudgetExhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_micros(settings.base_backoff_us),
            Duration::from_micros(settings.max_backoff_us),
        )
    }
}
