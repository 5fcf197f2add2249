//! In-memory backend with call counting and failure injection.

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::providers::{
    AllocationProvider, SnapshotStore, TransactionProvider, UserActivityProvider,
};
use crate::models::{Allocation, Period, Snapshot, Split};

#[derive(Default)]
pub(crate) struct FakeBackend {
    /// (allocation, owning user)
    allocations: RefCell<Vec<(Allocation, i64)>>,
    /// (split, owning user, transaction date)
    splits: RefCell<Vec<(Split, i64, NaiveDate)>>,
    snapshots: RefCell<BTreeMap<(i64, Period), Snapshot>>,
    next_id: Cell<i64>,
    pub(crate) fail_splits: Cell<bool>,
    /// Fail `save` for this period only.
    pub(crate) fail_save_at: Cell<Option<Period>>,
    pub(crate) saves: RefCell<Vec<Period>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    pub(crate) fn allocate(
        &self,
        user_id: i64,
        category_id: i64,
        period: Period,
        amount: Decimal,
    ) -> i64 {
        let id = self.next_id();
        let mut alloc = Allocation::new(category_id, period, amount);
        alloc.id = Some(id);
        self.allocations.borrow_mut().push((alloc, user_id));
        id
    }

    pub(crate) fn split(
        &self,
        user_id: i64,
        date: NaiveDate,
        allocation_id: Option<i64>,
        amount: Decimal,
    ) -> i64 {
        let id = self.next_id();
        let split = Split {
            id: Some(id),
            transaction_id: id,
            category_allocation_id: allocation_id,
            amount,
            period: Period::from_date(date),
        };
        self.splits.borrow_mut().push((split, user_id, date));
        id
    }

    pub(crate) fn stored(&self, user_id: i64, period: Period) -> Option<Snapshot> {
        self.snapshots.borrow().get(&(user_id, period)).cloned()
    }

    pub(crate) fn clear_saves(&self) {
        self.saves.borrow_mut().clear();
    }
}

impl AllocationProvider for FakeBackend {
    fn allocations_for_category(&self, category_id: i64) -> Result<Vec<Allocation>> {
        Ok(self
            .allocations
            .borrow()
            .iter()
            .filter(|(a, _)| a.category_id == category_id)
            .map(|(a, _)| a.clone())
            .collect())
    }

    fn allocations_for_user(&self, user_id: i64) -> Result<Vec<Allocation>> {
        Ok(self
            .allocations
            .borrow()
            .iter()
            .filter(|(_, u)| *u == user_id)
            .map(|(a, _)| a.clone())
            .collect())
    }
}

impl TransactionProvider for FakeBackend {
    fn splits_for_allocation(&self, allocation_id: i64) -> Result<Vec<Split>> {
        if self.fail_splits.get() {
            anyhow::bail!("split lookup unavailable");
        }
        Ok(self
            .splits
            .borrow()
            .iter()
            .filter(|(s, _, _)| s.category_allocation_id == Some(allocation_id))
            .map(|(s, _, _)| s.clone())
            .collect())
    }

    fn splits_by_period(&self, user_id: i64, period: Period) -> Result<Vec<Split>> {
        if self.fail_splits.get() {
            anyhow::bail!("split lookup unavailable");
        }
        Ok(self
            .splits
            .borrow()
            .iter()
            .filter(|(s, u, _)| *u == user_id && s.period == period)
            .map(|(s, _, _)| s.clone())
            .collect())
    }
}

impl UserActivityProvider for FakeBackend {
    fn earliest_activity_date(&self, user_id: i64) -> Result<Option<NaiveDate>> {
        Ok(self
            .splits
            .borrow()
            .iter()
            .filter(|(_, u, _)| *u == user_id)
            .map(|(_, _, d)| *d)
            .min())
    }
}

impl SnapshotStore for FakeBackend {
    fn get(&self, user_id: i64, period: Period) -> Result<Option<Snapshot>> {
        Ok(self.stored(user_id, period))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<Snapshot> {
        if self.fail_save_at.get() == Some(snapshot.period) {
            anyhow::bail!("store write failed for {}", snapshot.period);
        }
        let key = (snapshot.user_id, snapshot.period);
        let id = self
            .snapshots
            .borrow()
            .get(&key)
            .and_then(|s| s.id)
            .unwrap_or_else(|| self.next_id());
        let mut stored = snapshot.clone();
        stored.id = Some(id);
        stored.is_valid = true;
        self.snapshots.borrow_mut().insert(key, stored.clone());
        self.saves.borrow_mut().push(snapshot.period);
        Ok(stored)
    }

    fn invalidate_from_period(&self, user_id: i64, period: Period) -> Result<()> {
        for ((user, p), snapshot) in self.snapshots.borrow_mut().iter_mut() {
            if *user == user_id && *p >= period {
                snapshot.is_valid = false;
            }
        }
        Ok(())
    }
}
