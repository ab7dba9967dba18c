//! Full-size reference runs
//!
//! Reference benchmark sizes; these take a while on SQLite.

use crate::*;

#[test]
#[ignore]
fn test_in_place_one_client_ten_thousand() {
    let (_dir, tally) = open_prepared(ScenarioKind::InPlace, 1, 10_000);
    assert_eq!(tally.run().unwrap().count, 10_000);
}

#[test]
#[ignore]
fn test_row_locking_five_clients() {
    let (_dir, tally) = open_prepared(ScenarioKind::RowLocking, 5, 10_000);
    assert_eq!(tally.run().unwrap().count, 50_000);
}

#[test]
#[ignore]
fn test_lost_update_ten_clients() {
    let (_dir, tally) = open_prepared(ScenarioKind::LostUpdate, 10, 10_000);
    let report = tally.run().unwrap();
    assert!(report.count <= 100_000);
    println!("{}", report);
}

#[test]
#[ignore]
fn test_atomic_long_ten_clients() {
    let (_dir, tally) = open_prepared(ScenarioKind::AtomicLong, 10, 10_000);
    assert_eq!(tally.run().unwrap().count, 100_000);
}
