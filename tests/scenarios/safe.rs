//! SAFE scenarios keep every successful increment

use crate::*;

const WORKERS: usize = 6;
const REQUESTS: usize = 150;

#[test]
fn test_every_safe_scenario_counts_exactly() {
    for kind in safe_scenarios() {
        let (_dir, tally) = open_prepared(kind, WORKERS, REQUESTS);
        let report = tally.run().unwrap();

        assert_eq!(report.failed, 0, "{}: {:?}", kind, report.faults().collect::<Vec<_>>());
        assert_eq!(report.succeeded, (WORKERS * REQUESTS) as u64, "{}", kind);
        assert_eq!(report.count, (WORKERS * REQUESTS) as u64, "{}", kind);
        assert_eq!(report.consistency.verdict, Verdict::Consistent, "{}", kind);
    }
}

#[test]
fn test_safe_scenarios_stay_exact_with_think_time() {
    for kind in [
        ScenarioKind::RowLocking,
        ScenarioKind::Optimistic,
        ScenarioKind::MapPessimistic,
        ScenarioKind::MapOptimistic,
    ] {
        let dir = TempDir::new().unwrap();
        let tally = Tally::builder()
            .scenario(kind)
            .sql_path(dir.path().join("counter.db"))
            .workers(3)
            .requests_per_worker(10)
            .think_time(std::time::Duration::from_millis(1))
            .reset(true)
            .open()
            .unwrap();
        tally.prepare().unwrap();
        let report = tally.run().unwrap();
        assert_eq!(report.count, 30, "{}", kind);
    }
}

#[test]
fn test_single_worker_cas_needs_no_retries() {
    for kind in [ScenarioKind::Optimistic, ScenarioKind::MapOptimistic] {
        let (_dir, tally) = open_prepared(kind, 1, 200);
        let report = tally.run().unwrap();
        assert_eq!(report.retries, 0, "{}", kind);
        assert_eq!(report.count, 200, "{}", kind);
    }
}

#[test]
fn test_runs_accumulate_without_reset() {
    let dir = TempDir::new().unwrap();
    let tally = Tally::builder()
        .scenario(ScenarioKind::InPlace)
        .sql_path(dir.path().join("counter.db"))
        .workers(2)
        .requests_per_worker(25)
        .open()
        .unwrap();
    tally.prepare().unwrap();

    let first = tally.run().unwrap();
    let second = tally.run().unwrap();
    assert_eq!(first.count, 50);
    assert_eq!(second.initial, 50);
    assert_eq!(second.count, 100);
    assert!(!second.is_violation());
}

#[test]
fn test_report_totals_match_workers() {
    let (_dir, tally) = open_prepared(ScenarioKind::Serializable, 4, 50);
    let report = tally.run().unwrap();
    assert_eq!(report.workers.len(), 4);
    assert_eq!(report.total_requests, 200);
    let per_worker: u64 = report.workers.iter().map(|w| w.iterations()).sum();
    assert_eq!(per_worker, report.total_requests);
}
