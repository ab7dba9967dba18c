//! UNSAFE scenarios promise only an upper bound

use crate::*;
use std::time::Duration;

#[test]
fn test_unsafe_scenarios_never_exceed_attempts() {
    for kind in [ScenarioKind::LostUpdate, ScenarioKind::MapNoLock] {
        let (_dir, tally) = open_prepared(kind, 8, 100);
        let report = tally.run().unwrap();
        assert!(report.count <= 800, "{}: {}", kind, report.count);
        assert!(!report.is_violation(), "{}", kind);
    }
}

#[test]
fn test_think_time_reproduces_lost_updates() {
    for kind in [ScenarioKind::LostUpdate, ScenarioKind::MapNoLock] {
        let dir = TempDir::new().unwrap();
        let tally = Tally::builder()
            .scenario(kind)
            .sql_path(dir.path().join("counter.db"))
            .workers(4)
            .requests_per_worker(5)
            .think_time(Duration::from_millis(10))
            .reset(true)
            .open()
            .unwrap();
        tally.prepare().unwrap();

        let report = tally.run().unwrap();
        assert!(report.count < report.succeeded, "{}: no loss observed", kind);
        match report.consistency.verdict {
            Verdict::LostUpdates { lost } => {
                assert_eq!(lost, report.succeeded - report.count)
            }
            other => panic!("{}: unexpected verdict {:?}", kind, other),
        }
    }
}

#[test]
fn test_single_worker_unsafe_is_exact() {
    for kind in [ScenarioKind::LostUpdate, ScenarioKind::MapNoLock] {
        let (_dir, tally) = open_prepared(kind, 1, 100);
        let report = tally.run().unwrap();
        assert_eq!(report.count, 100, "{}", kind);
        assert_eq!(report.consistency.verdict, Verdict::Consistent);
    }
}
