//! Collaborator interfaces consumed by the snapshot engine.
//!
//! `Database` implements all four against SQLite; tests use an in-memory fake.

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::{Allocation, Period, Snapshot, Split};

pub trait AllocationProvider {
    fn allocations_for_category(&self, category_id: i64) -> Result<Vec<Allocation>>;
    fn allocations_for_user(&self, user_id: i64) -> Result<Vec<Allocation>>;
}

pub trait TransactionProvider {
    fn splits_for_allocation(&self, allocation_id: i64) -> Result<Vec<Split>>;
    /// Splits on the user's transactions dated within `period`.
    fn splits_by_period(&self, user_id: i64, period: Period) -> Result<Vec<Split>>;
}

pub trait UserActivityProvider {
    /// Date of the user's earliest transaction, or `None` if there are none.
    fn earliest_activity_date(&self, user_id: i64) -> Result<Option<NaiveDate>>;
}

pub trait SnapshotStore {
    fn get(&self, user_id: i64, period: Period) -> Result<Option<Snapshot>>;
    /// Atomic upsert keyed by (user, period). The returned snapshot is the stored row,
    /// always with `is_valid = true`.
    fn save(&self, snapshot: &Snapshot) -> Result<Snapshot>;
    /// Mark every snapshot for `user_id` at or after `period` invalid.
    fn invalidate_from_period(&self, user_id: i64, period: Period) -> Result<()>;
}

/// Everything the engine needs from one backend.
pub trait BudgetBackend:
    AllocationProvider + TransactionProvider + UserActivityProvider + SnapshotStore
{
}

impl<T> BudgetBackend for T where
    T: AllocationProvider + TransactionProvider + UserActivityProvider + SnapshotStore
{
}
