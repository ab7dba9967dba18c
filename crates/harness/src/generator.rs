//! Synchronized multi-worker load generator
//!
//! A run moves through five phases:
//!
//! ```text
//! Configured ──► BarrierWait ──► Running ──► Joining ──► Reported
//!  read initial   workers connect  R increments  scope ends   final read,
//!  value          and park on a    per worker                 report
//!                 W+1 barrier
//! ```
//!
//! The coordinating thread is the extra barrier party and takes the start
//! instant when the barrier releases, so connection setup is never timed.
//! Workers are scoped threads; the scope joins them all before the final
//! read.

use crate::report::ConsistencyReport;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};
use tally_concurrency::Scenario;
use tally_core::{BackendKind, Correctness, Error, Result, ScenarioKind, TallyConfig};
use tracing::{debug, info, warn};

// ============================================================================
// Phases
// ============================================================================

/// Lifecycle phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    /// Parameters validated, initial value read
    Configured,
    /// Workers connecting and parked on the start barrier
    BarrierWait,
    /// Barrier released, workers incrementing
    Running,
    /// Waiting for every worker to finish
    Joining,
    /// Final value read and report assembled
    Reported,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Configured => "configured",
            RunPhase::BarrierWait => "barrier-wait",
            RunPhase::Running => "running",
            RunPhase::Joining => "joining",
            RunPhase::Reported => "reported",
        };
        f.write_str(name)
    }
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

// ============================================================================
// Worker Result
// ============================================================================

/// What one worker did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerResult {
    /// Worker index
    pub worker: usize,
    /// Increments that returned success
    pub succeeded: u64,
    /// Iterations that did not
    pub failed: u64,
    /// Failed iterations that may still have applied
    pub indeterminate: u64,
    /// Strategy retries across all iterations
    pub retries: u64,
    /// Time from barrier release to the worker's last iteration
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    /// Fault that ended the worker early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl WorkerResult {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Default::default()
        }
    }

    /// Iterations accounted for
    pub fn iterations(&self) -> u64 {
        self.succeeded + self.failed
    }

    fn abort(&mut self, remaining: u64, fault: &Error) {
        warn!(worker = self.worker, remaining, error = %fault, "worker aborted");
        self.failed += remaining;
        self.fault = Some(fault.to_string());
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Scenario run
    pub scenario: ScenarioKind,
    /// Backend it ran on
    pub backend: BackendKind,
    /// Promised consistency
    pub correctness: Correctness,
    /// Concurrent workers
    pub clients: usize,
    /// Increments attempted per worker
    pub requests_per_client: usize,
    /// `clients * requests_per_client`
    pub total_requests: u64,
    /// Successful increments
    pub succeeded: u64,
    /// Failed iterations
    pub failed: u64,
    /// Failed iterations that may have applied
    pub indeterminate: u64,
    /// Strategy retries
    pub retries: u64,
    /// Barrier release to last join
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    /// Successful increments per second
    pub throughput: f64,
    /// Counter before the run
    pub initial: u64,
    /// Counter after the run
    pub count: u64,
    /// Final consistency check
    pub consistency: ConsistencyReport,
    /// Per-worker breakdown
    pub workers: Vec<WorkerResult>,
}

impl RunReport {
    /// Whether the scenario broke its consistency promise
    pub fn is_violation(&self) -> bool {
        self.consistency.is_violation()
    }

    /// Faults that ended workers early
    pub fn faults(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().filter_map(|w| w.fault.as_deref())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario={} clients={} requests_per_client={} total_requests={} elapsed={:.3}s throughput={:.1}rps count={}",
            self.scenario,
            self.clients,
            self.requests_per_client,
            self.total_requests,
            self.elapsed.as_secs_f64(),
            self.throughput,
            self.count
        )?;
        write!(
            f,
            "{} {}: succeeded={} failed={} retries={} {}",
            self.backend,
            self.correctness,
            self.succeeded,
            self.failed,
            self.retries,
            self.consistency
        )
    }
}

// ============================================================================
// Load Generator
// ============================================================================

/// Drives `workers` concurrent workers, `requests_per_worker` increments
/// each, against one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadGenerator {
    workers: usize,
    requests_per_worker: usize,
}

impl LoadGenerator {
    /// Generator for `workers × requests_per_worker` increments
    ///
    /// # Errors
    ///
    /// `ConfigurationFault` if either count is zero.
    pub fn new(workers: usize, requests_per_worker: usize) -> Result<Self> {
        if workers == 0 || requests_per_worker == 0 {
            return Err(Error::ConfigurationFault(format!(
                "need at least one worker and one request, got {} x {}",
                workers, requests_per_worker
            )));
        }
        Ok(Self {
            workers,
            requests_per_worker,
        })
    }

    /// Generator sized from configuration
    pub fn from_config(config: &TallyConfig) -> Result<Self> {
        Self::new(config.workers, config.requests_per_worker)
    }

    /// Worker count
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Increments per worker
    pub fn requests_per_worker(&self) -> usize {
        self.requests_per_worker
    }

    /// Run `scenario` to completion and report
    ///
    /// Worker faults are recorded in the report; only a failed initial or
    /// final read aborts the run.
    pub fn run(&self, scenario: &Scenario) -> Result<RunReport> {
        let store = scenario.store();
        let initial = store.read()?.value;
        info!(
            phase = %RunPhase::Configured,
            scenario = %scenario.kind(),
            workers = self.workers,
            requests_per_worker = self.requests_per_worker,
            initial,
            "run configured"
        );

        let barrier = Barrier::new(self.workers + 1);
        let requests = self.requests_per_worker as u64;

        let (workers, elapsed) = thread::scope(|s| {
            let handles: Vec<_> = (0..self.workers)
                .map(|index| {
                    let barrier = &barrier;
                    s.spawn(move || run_worker(index, scenario, barrier, requests))
                })
                .collect();

            debug!(phase = %RunPhase::BarrierWait, "waiting for workers to connect");
            barrier.wait();
            let start = Instant::now();
            info!(phase = %RunPhase::Running, "barrier released");

            let results: Vec<WorkerResult> = handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        let mut lost = WorkerResult::new(index);
                        lost.abort(
                            requests,
                            &Error::Storage("worker thread panicked".into()),
                        );
                        lost
                    })
                })
                .collect();
            let elapsed = start.elapsed();
            debug!(phase = %RunPhase::Joining, ?elapsed, "workers joined");
            (results, elapsed)
        });

        let count = store.read()?.value;
        let report = self.assemble(scenario, initial, count, elapsed, workers);
        info!(
            phase = %RunPhase::Reported,
            scenario = %report.scenario,
            succeeded = report.succeeded,
            failed = report.failed,
            count = report.count,
            verdict = %report.consistency.verdict,
            "run complete"
        );
        if report.is_violation() {
            warn!(scenario = %report.scenario, consistency = %report.consistency, "consistency violated");
        }
        Ok(report)
    }

    fn assemble(
        &self,
        scenario: &Scenario,
        initial: u64,
        count: u64,
        elapsed: Duration,
        workers: Vec<WorkerResult>,
    ) -> RunReport {
        let succeeded = workers.iter().map(|w| w.succeeded).sum();
        let failed = workers.iter().map(|w| w.failed).sum();
        let indeterminate = workers.iter().map(|w| w.indeterminate).sum();
        let retries = workers.iter().map(|w| w.retries).sum();
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 {
            succeeded as f64 / secs
        } else {
            0.0
        };

        RunReport {
            scenario: scenario.kind(),
            backend: scenario.kind().backend(),
            correctness: scenario.correctness(),
            clients: self.workers,
            requests_per_client: self.requests_per_worker,
            total_requests: (self.workers * self.requests_per_worker) as u64,
            succeeded,
            failed,
            indeterminate,
            retries,
            elapsed,
            throughput,
            initial,
            count,
            consistency: ConsistencyReport::evaluate(
                scenario.correctness(),
                initial,
                succeeded,
                indeterminate,
                count,
            ),
            workers,
        }
    }
}

/// One worker: connect, wait for the start, then `requests` increments
///
/// Reaches the barrier on every path so the coordinator never deadlocks.
fn run_worker(index: usize, scenario: &Scenario, barrier: &Barrier, requests: u64) -> WorkerResult {
    let connected = scenario.connect();
    barrier.wait();
    let start = Instant::now();
    let mut result = WorkerResult::new(index);

    let mut strategy = match connected {
        Ok(strategy) => strategy,
        Err(e) => {
            result.abort(requests, &e);
            result.elapsed = start.elapsed();
            return result;
        }
    };

    for done in 0..requests {
        match strategy.increment() {
            Ok(increment) => {
                result.succeeded += 1;
                result.retries += u64::from(increment.retries);
            }
            Err(e) if e.is_fatal() => {
                result.abort(requests - done, &e);
                break;
            }
            Err(e) => {
                result.failed += 1;
                if e.is_indeterminate() {
                    result.indeterminate += 1;
                }
                debug!(worker = index, error = %e, "iteration failed");
            }
        }
    }

    result.elapsed = start.elapsed();
    debug!(
        worker = index,
        succeeded = result.succeeded,
        failed = result.failed,
        retries = result.retries,
        "worker finished"
    );
    result
}
