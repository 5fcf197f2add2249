#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use super::*;
use crate::engine::{SnapshotStore, TransactionProvider};

fn p(year: i32, month: u32) -> Period {
    Period::new(year, month).unwrap()
}

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn spend(category: &str, amount: Decimal) -> SplitRequest {
    SplitRequest {
        category: Some(category.to_string()),
        amount,
    }
}

fn income(amount: Decimal) -> SplitRequest {
    SplitRequest {
        category: None,
        amount,
    }
}

/// Returns (user_id, oct expense txn id, dec income txn id).
fn seed(svc: &mut BudgetService<'_>) -> (i64, i64, i64) {
    let user = svc.db.ensure_user("alice").unwrap().id;
    svc.add_category(user, "Dining").unwrap();
    for month in [10, 11, 12] {
        svc.assign(user, "Dining", p(2025, month), dec!(100)).unwrap();
    }
    let expense = svc
        .record_transaction(user, d(2025, 10, 15), "dinner", &[spend("dining", dec!(150))])
        .unwrap();
    let paycheck = svc
        .record_transaction(user, d(2025, 12, 1), "paycheck", &[income(dec!(300))])
        .unwrap();
    (user, expense, paycheck)
}

#[test]
fn test_scenario_end_to_end() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(&mut db, EngineConfig::default());
    let (user, _, _) = seed(&mut svc);

    assert_eq!(svc.snapshot(user, p(2025, 10)).unwrap().ready_to_assign, dec!(-100));
    assert_eq!(svc.snapshot(user, p(2025, 11)).unwrap().ready_to_assign, dec!(-250));
    let dec_snap = svc.snapshot(user, p(2025, 12)).unwrap();
    assert_eq!(dec_snap.ready_to_assign, dec!(-50));
    assert_eq!(dec_snap.categories.len(), 1);
    assert_eq!(dec_snap.categories[0].available, dec!(150));
}

#[test]
fn test_assign_invalidates_forward() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(&mut db, EngineConfig::default());
    let (user, _, _) = seed(&mut svc);
    svc.snapshot(user, p(2025, 12)).unwrap();

    svc.assign(user, "Dining", p(2025, 11), dec!(60)).unwrap();
    assert!(svc.db.get(user, p(2025, 10)).unwrap().unwrap().is_valid);
    assert!(!svc.db.get(user, p(2025, 11)).unwrap().unwrap().is_valid);
    assert!(!svc.db.get(user, p(2025, 12)).unwrap().unwrap().is_valid);

    // Nov: -100 - 60 - 50 = -210; Dec: -210 + 300 - 100 - 0 = -10.
    assert_eq!(svc.snapshot(user, p(2025, 12)).unwrap().ready_to_assign, dec!(-10));
}

#[test]
fn test_split_moved_to_earlier_allocation_invalidates_from_that_period() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(&mut db, EngineConfig::default());
    let (user, _, paycheck) = seed(&mut svc);
    svc.snapshot(user, p(2025, 12)).unwrap();

    let category_id = svc.db.get_category_by_name(user, "Dining").unwrap().unwrap().id.unwrap();
    let oct_alloc = svc.db.get_allocation_for(category_id, p(2025, 10)).unwrap().unwrap();
    let split_id = svc.db.get_splits_for_transaction(paycheck).unwrap()[0].id.unwrap();

    svc.update_split(user, split_id, dec!(300), oct_alloc.id).unwrap();
    assert!(!svc.db.get(user, p(2025, 10)).unwrap().unwrap().is_valid);

    let dec_snap = svc.snapshot(user, p(2025, 12)).unwrap();
    assert_eq!(dec_snap.ready_to_assign, dec!(-900));
    assert_eq!(dec_snap.categories[0].activity, dec!(450));
    assert_eq!(dec_snap.categories[0].available, dec!(-150));
}

#[test]
fn test_delete_transaction_invalidates_and_recomputes() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(&mut db, EngineConfig::default());
    let (user, expense, _) = seed(&mut svc);
    svc.snapshot(user, p(2025, 12)).unwrap();

    svc.delete_transaction(user, expense).unwrap();
    assert!(!svc.db.get(user, p(2025, 10)).unwrap().unwrap().is_valid);
    // With the overspend gone, earliest activity moves to December.
    assert_eq!(svc.snapshot(user, p(2025, 12)).unwrap().ready_to_assign, dec!(200));
}

#[test]
fn test_delete_other_users_transaction_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(&mut db, EngineConfig::default());
    let (_, expense, _) = seed(&mut svc);
    let bob = svc.db.ensure_user("bob").unwrap().id;

    assert!(svc.delete_transaction(bob, expense).is_err());
    assert!(svc.db.get_transaction(expense).unwrap().is_some());
}

#[test]
fn test_split_cannot_move_to_other_users_allocation() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(&mut db, EngineConfig::default());
    let (alice, _, paycheck) = seed(&mut svc);
    let bob = svc.db.ensure_user("bob").unwrap().id;
    svc.add_category(bob, "Rent").unwrap();
    svc.assign(bob, "Rent", p(2025, 10), dec!(1000)).unwrap();
    let bob_cat = svc.db.get_category_by_name(bob, "Rent").unwrap().unwrap().id.unwrap();
    let bob_alloc = svc.db.get_allocation_for(bob_cat, p(2025, 10)).unwrap().unwrap();
    assert_eq!(svc.snapshot(bob, p(2025, 10)).unwrap().categories[0].available, dec!(1000));

    let split_id = svc.db.get_splits_for_transaction(paycheck).unwrap()[0].id.unwrap();
    assert!(svc.update_split(alice, split_id, dec!(300), bob_alloc.id).is_err());

    let split = svc.db.get_split(split_id).unwrap().unwrap();
    assert_eq!(split.category_allocation_id, None);
    assert!(svc.db.splits_for_allocation(bob_alloc.id.unwrap()).unwrap().is_empty());
    let cached = svc.db.get(bob, p(2025, 10)).unwrap().unwrap();
    assert!(cached.is_valid);
    assert_eq!(cached.categories[0].available, dec!(1000));
}

#[test]
fn test_spend_without_allocation_is_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(&mut db, EngineConfig::default());
    let (user, _, _) = seed(&mut svc);

    let err = svc
        .record_transaction(user, d(2026, 1, 4), "late", &[spend("Dining", dec!(5))])
        .unwrap_err();
    assert!(err.to_string().contains("Nothing assigned"));
    assert!(svc.db.splits_by_period(user, p(2026, 1)).unwrap().is_empty());
}

#[test]
fn test_assign_unknown_category_fails() {
    let mut db = Database::open_in_memory().unwrap();
    let svc = BudgetService::new(&mut db, EngineConfig::default());
    let user = svc.db.ensure_user("alice").unwrap().id;
    assert!(svc.assign(user, "Nope", p(2025, 1), dec!(1)).is_err());
}

#[test]
fn test_configured_chain_limit_surfaces_error() {
    let mut db = Database::open_in_memory().unwrap();
    let mut svc = BudgetService::new(
        &mut db,
        EngineConfig {
            max_chain_len: Some(1),
        },
    );
    let (user, _, _) = seed(&mut svc);
    let err = svc.snapshot(user, p(2025, 12)).unwrap_err();
    assert!(err.to_string().contains("exceeded"));
}
