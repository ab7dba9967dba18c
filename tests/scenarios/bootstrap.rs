//! prepare / reset / read through the facade

use crate::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_prepare_is_idempotent_and_keeps_value() {
    for kind in [
        ScenarioKind::InPlace,
        ScenarioKind::FileLock,
        ScenarioKind::MapPessimistic,
        ScenarioKind::AtomicLong,
    ] {
        let (_dir, tally) = open_prepared(kind, 2, 10);
        tally.run().unwrap();
        tally.prepare().unwrap();
        tally.prepare().unwrap();
        assert_eq!(tally.read().unwrap().value, 20, "{}", kind);
    }
}

#[test]
fn test_concurrent_prepare_is_safe() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("counter.db");
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let store = SqlCounter::new(path, 1);
                barrier.wait();
                store.prepare()
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }
    assert_eq!(SqlCounter::new(path, 1).read().unwrap().value, 0);
}

#[test]
fn test_unprepared_sql_is_configuration_fault() {
    let dir = TempDir::new().unwrap();
    let tally = Tally::builder()
        .scenario(ScenarioKind::InPlace)
        .sql_path(dir.path().join("never-prepared.db"))
        .open()
        .unwrap();
    assert!(matches!(tally.run(), Err(Error::ConfigurationFault(_))));
    assert!(matches!(tally.read(), Err(Error::ConfigurationFault(_))));
}

#[test]
fn test_unprepared_file_is_configuration_fault() {
    let dir = TempDir::new().unwrap();
    let tally = Tally::builder()
        .scenario(ScenarioKind::FileLock)
        .file_path(dir.path().join("missing.txt"))
        .open()
        .unwrap();
    assert!(matches!(tally.read(), Err(Error::ConfigurationFault(_))));
}

#[test]
fn test_reset_then_read() {
    let (_dir, tally) = open_prepared(ScenarioKind::Optimistic, 1, 1);
    tally.reset_to(1234).unwrap();
    let state = tally.read().unwrap();
    assert_eq!(state.value, 1234);
    assert!(state.version.is_some());
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tally.toml");
    std::fs::write(
        &config_path,
        format!(
            "scenario = \"row-locking\"\nworkers = 2\nrequests_per_worker = 5\nreset = true\n\n[sql]\npath = {:?}\n",
            dir.path().join("counter.db")
        ),
    )
    .unwrap();

    let tally = Tally::open(TallyConfig::load(&config_path).unwrap()).unwrap();
    tally.prepare().unwrap();
    assert_eq!(tally.run().unwrap().count, 10);
}
