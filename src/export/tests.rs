#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;

use super::*;
use crate::models::{CategoryState, Period};

fn sample() -> (Snapshot, Vec<Category>) {
    let mut dining = Category::new(1, "Dining".into());
    dining.id = Some(4);
    let snapshot = Snapshot::new(
        1,
        Period::new(2025, 11).unwrap(),
        dec!(-250),
        vec![
            CategoryState {
                category_id: 4,
                assigned: dec!(100),
                activity: dec!(150),
                available: dec!(50),
            },
            CategoryState {
                category_id: 9,
                assigned: dec!(0),
                activity: dec!(0),
                available: dec!(12.5),
            },
        ],
    );
    (snapshot, vec![dining])
}

#[test]
fn test_write_snapshot_csv() {
    let (snapshot, categories) = sample();
    let mut buf = Vec::new();
    let rows = write_snapshot_csv(&snapshot, &categories, &mut buf).unwrap();
    assert_eq!(rows, 2);

    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "period,category,assigned,activity,available");
    assert_eq!(lines[1], "2025-11,Dining,100,150,50");
    // Unknown categories fall back to their id.
    assert_eq!(lines[2], "2025-11,#9,0,0,12.5");
    assert_eq!(lines[3], "2025-11,Ready to Assign,,,-250");
}

#[test]
fn test_export_snapshot_to_file() {
    let (snapshot, categories) = sample();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nov.csv");
    export_snapshot(&snapshot, &categories, &path).unwrap();

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(&records[2][4], "-250");
}
