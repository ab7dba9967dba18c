//! Unavailable backends, session loss and the redo flag

use crate::*;

fn atomic(redo: bool, workers: usize, requests: usize) -> Tally {
    let tally = Tally::builder()
        .scenario(ScenarioKind::AtomicLong)
        .redo_operation(redo)
        .workers(workers)
        .requests_per_worker(requests)
        .reset(true)
        .open()
        .unwrap();
    tally.prepare().unwrap();
    tally
}

#[test]
fn test_redo_on_hides_session_loss() {
    let tally = atomic(true, 3, 20);
    tally.grid().cp().inject(CpFault::DropResponse, 2);
    tally.grid().cp().inject(CpFault::ExpireSession, 2);

    let report = tally.run().unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.count, 60);
    assert_eq!(tally.grid().cp().applied_increments(), 60);
}

#[test]
fn test_redo_off_surfaces_session_loss() {
    let tally = atomic(false, 2, 20);
    tally.grid().cp().inject(CpFault::ExpireSession, 3);

    let report = tally.run().unwrap();
    assert_eq!(report.failed, 3);
    assert_eq!(report.indeterminate, 3);
    // Expired sessions applied nothing.
    assert_eq!(report.count, 37);
    assert_eq!(report.consistency.verdict, Verdict::Consistent);
}

#[test]
fn test_dropped_replies_without_redo_stay_consistent() {
    let tally = atomic(false, 2, 20);
    tally.grid().cp().inject(CpFault::DropResponse, 3);

    let report = tally.run().unwrap();
    assert_eq!(report.succeeded, 37);
    assert_eq!(report.count, 40);
    assert!(!report.is_violation());
}

#[test]
fn test_unavailable_grid_never_reads_as_zero() {
    let tally = atomic(false, 1, 1);
    tally.run().unwrap();
    tally.grid().set_online(false);
    assert!(matches!(tally.read(), Err(Error::BackendUnavailable(_))));
    assert!(matches!(tally.run(), Err(Error::BackendUnavailable(_))));
    tally.grid().set_online(true);
    assert_eq!(tally.read().unwrap().value, 1);
}

#[test]
fn test_non_database_file_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("bogus.db");
    std::fs::write(&bogus, b"plain text where a database header should be, padded out")
        .unwrap();

    let scenario = Scenario::new(ScenarioKind::InPlace, Target::Sql(SqlCounter::new(&bogus, 1)))
        .unwrap();
    assert!(matches!(
        scenario.store().read(),
        Err(Error::BackendUnavailable(_))
    ));
    assert!(matches!(
        LoadGenerator::new(2, 2).unwrap().run(&scenario),
        Err(Error::BackendUnavailable(_))
    ));
}

#[test]
fn test_retry_budget_exhaustion_is_a_failed_iteration() {
    let dir = TempDir::new().unwrap();
    let tally = Tally::builder()
        .scenario(ScenarioKind::Optimistic)
        .sql_path(dir.path().join("counter.db"))
        .max_attempts(1)
        .workers(6)
        .requests_per_worker(50)
        .think_time(std::time::Duration::from_millis(1))
        .reset(true)
        .open()
        .unwrap();
    tally.prepare().unwrap();

    let report = tally.run().unwrap();
    // One attempt each: contended increments fail instead of retrying, and
    // failures never count as successes.
    assert!(report.failed > 0);
    assert_eq!(report.succeeded + report.failed, 300);
    assert_eq!(report.count, report.succeeded);
    assert!(!report.is_violation());
}
