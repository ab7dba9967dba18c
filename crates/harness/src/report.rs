//! Consistency reporter
//!
//! Compares the final observed counter against what the successful
//! increments imply:
//!
//! ```text
//! expected = initial + successful
//!
//! SAFE    exact     expected <= observed <= expected + indeterminate
//! UNSAFE  at most               observed <= expected + indeterminate
//! ```
//!
//! `indeterminate` counts calls that failed with a lost session: each may or
//! may not have been applied. Anything outside the window is a violation.
//! An UNSAFE run that lands below `expected` lost updates, which is what
//! that scenario demonstrates, not a defect.

use serde::Serialize;
use std::fmt;
use tally_core::Correctness;

/// What the scenario promises about the final value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guarantee {
    /// Every success reflected exactly once
    Exact,
    /// Never more than the successes
    AtMost,
}

impl From<Correctness> for Guarantee {
    fn from(correctness: Correctness) -> Self {
        match correctness {
            Correctness::Safe => Guarantee::Exact,
            Correctness::Unsafe => Guarantee::AtMost,
        }
    }
}

/// Outcome of the comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Observed value is within the promised window
    Consistent,
    /// Unguarded scenario overwrote `lost` increments
    LostUpdates {
        /// Increments missing from the observed value
        lost: u64,
    },
    /// The promise was broken
    Violated,
}

/// Final consistency of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Promise checked
    pub guarantee: Guarantee,
    /// `initial + successful`
    pub expected: u64,
    /// Final authoritative read
    pub observed: u64,
    /// Failed calls that may have applied
    pub indeterminate: u64,
    /// Result
    pub verdict: Verdict,
}

impl ConsistencyReport {
    /// Classify `observed` against a run's counts
    pub fn evaluate(
        correctness: Correctness,
        initial: u64,
        successful: u64,
        indeterminate: u64,
        observed: u64,
    ) -> Self {
        let guarantee = Guarantee::from(correctness);
        let expected = initial.saturating_add(successful);
        let ceiling = expected.saturating_add(indeterminate);

        let verdict = if observed > ceiling {
            Verdict::Violated
        } else if observed >= expected {
            Verdict::Consistent
        } else {
            match guarantee {
                Guarantee::Exact => Verdict::Violated,
                Guarantee::AtMost => Verdict::LostUpdates {
                    lost: expected - observed,
                },
            }
        };

        Self {
            guarantee,
            expected,
            observed,
            indeterminate,
            verdict,
        }
    }

    /// Whether the scenario broke its promise
    pub fn is_violation(&self) -> bool {
        self.verdict == Verdict::Violated
    }

    /// Increments missing from the observed value
    pub fn lost(&self) -> u64 {
        self.expected.saturating_sub(self.observed)
    }
}

impl fmt::Display for Guarantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guarantee::Exact => f.write_str("exact"),
            Guarantee::AtMost => f.write_str("at-most"),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Consistent => f.write_str("consistent"),
            Verdict::LostUpdates { lost } => write!(f, "lost {} update(s)", lost),
            Verdict::Violated => f.write_str("VIOLATED"),
        }
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} guarantee={} expected={} observed={}",
            self.verdict, self.guarantee, self.expected, self.observed
        )?;
        if self.indeterminate > 0 {
            write!(f, " indeterminate={}", self.indeterminate)?;
        }
        Ok(())
    }
}
