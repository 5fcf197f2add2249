//! Write paths for allocations and transactions.
//!
//! Every mutation here is followed by forward invalidation from the earliest
//! period it can affect. A split changes its category's rollup through the
//! period of its allocation, so that period counts as well as the
//! transaction's own month.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::db::Database;
use crate::engine::{EngineConfig, SnapshotEngine};
use crate::models::{Allocation, Category, NewSplit, Period, Snapshot, Transaction};

/// A split as requested by a caller: an amount and, for spending, a category name.
#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub category: Option<String>,
    pub amount: Decimal,
}

pub struct BudgetService<'a> {
    db: &'a mut Database,
    config: EngineConfig,
}

impl<'a> BudgetService<'a> {
    pub fn new(db: &'a mut Database, config: EngineConfig) -> Self {
        Self { db, config }
    }

    pub fn engine(&self) -> SnapshotEngine<'_, Database> {
        SnapshotEngine::with_config(&*self.db, self.config)
    }

    pub fn snapshot(&self, user_id: i64, period: Period) -> Result<Snapshot> {
        Ok(self.engine().get_snapshot(user_id, period)?)
    }

    pub fn invalidate(&self, user_id: i64, period: Period) -> Result<()> {
        Ok(self
            .engine()
            .invalidate_snapshots_from_period(user_id, period)?)
    }

    pub fn categories(&self, user_id: i64) -> Result<Vec<Category>> {
        self.db.get_categories(user_id)
    }

    /// Stored snapshots as they are, without rebuilding stale ones.
    pub fn stored_snapshots(&self, user_id: i64) -> Result<Vec<Snapshot>> {
        self.db.get_snapshots(user_id)
    }

    pub fn add_category(&self, user_id: i64, name: &str) -> Result<i64> {
        self.db
            .insert_category(&Category::new(user_id, name.to_string()))
    }

    /// Budget `amount` into `category` for `period`, replacing any earlier figure.
    pub fn assign(
        &self,
        user_id: i64,
        category: &str,
        period: Period,
        amount: Decimal,
    ) -> Result<i64> {
        let category_id = self.category_id(user_id, category)?;
        let id = self
            .db
            .upsert_allocation(&Allocation::new(category_id, period, amount))?;
        info!(user_id, category, %period, %amount, "assigned");
        self.invalidate(user_id, period)?;
        Ok(id)
    }

    /// Record a transaction. Splits naming a category are charged to that
    /// category's allocation for the transaction's month, which must exist.
    pub fn record_transaction(
        &mut self,
        user_id: i64,
        date: NaiveDate,
        description: &str,
        splits: &[SplitRequest],
    ) -> Result<i64> {
        let period = Period::from_date(date);
        let mut affected = period;
        let mut new_splits = Vec::with_capacity(splits.len());
        for req in splits {
            let category_allocation_id = match &req.category {
                Some(name) => {
                    let alloc = self.allocation_for(user_id, name, period)?;
                    affected = affected.min(alloc.period);
                    alloc.id
                }
                None => None,
            };
            new_splits.push(NewSplit {
                category_allocation_id,
                amount: req.amount,
            });
        }

        let txn = Transaction::new(user_id, date, description.to_string());
        let id = self.db.insert_transaction(&txn, &new_splits)?;
        info!(user_id, id, %date, splits = new_splits.len(), "recorded transaction");
        self.invalidate(user_id, affected)?;
        Ok(id)
    }

    /// Change a split's amount and/or the allocation it is charged to.
    pub fn update_split(
        &self,
        user_id: i64,
        split_id: i64,
        amount: Decimal,
        category_allocation_id: Option<i64>,
    ) -> Result<()> {
        let split = self
            .db
            .get_split(split_id)?
            .ok_or_else(|| anyhow::anyhow!("Split {split_id} not found"))?;
        let owner = self
            .db
            .get_transaction(split.transaction_id)?
            .map(|t| t.user_id);
        if owner != Some(user_id) {
            anyhow::bail!("Split {split_id} not found");
        }
        let mut affected = split.period;
        if let Some(old_id) = split.category_allocation_id {
            affected = affected.min(self.allocation_period(old_id)?);
        }
        if let Some(new_id) = category_allocation_id {
            affected = affected.min(self.owned_allocation(user_id, new_id)?.period);
        }

        self.db
            .update_split(split_id, amount, category_allocation_id)?;
        info!(user_id, split_id, %amount, "updated split");
        self.invalidate(user_id, affected)
    }

    pub fn delete_transaction(&self, user_id: i64, transaction_id: i64) -> Result<()> {
        let txn = self
            .db
            .get_transaction(transaction_id)?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| anyhow::anyhow!("Transaction {transaction_id} not found"))?;
        let mut affected = txn.period();
        for split in self.db.get_splits_for_transaction(transaction_id)? {
            if let Some(alloc_id) = split.category_allocation_id {
                affected = affected.min(self.allocation_period(alloc_id)?);
            }
        }

        self.db.delete_transaction(transaction_id)?;
        info!(user_id, transaction_id, "deleted transaction");
        self.invalidate(user_id, affected)
    }

    fn category_id(&self, user_id: i64, name: &str) -> Result<i64> {
        self.db
            .get_category_by_name(user_id, name)?
            .and_then(|c| c.id)
            .ok_or_else(|| anyhow::anyhow!("Category '{name}' not found"))
    }

    fn allocation_for(&self, user_id: i64, category: &str, period: Period) -> Result<Allocation> {
        let category_id = self.category_id(user_id, category)?;
        self.db
            .get_allocation_for(category_id, period)?
            .with_context(|| format!("Nothing assigned to '{category}' for {period}"))
    }

    /// The allocation, provided its category belongs to `user_id`.
    fn owned_allocation(&self, user_id: i64, allocation_id: i64) -> Result<Allocation> {
        let not_found = || anyhow::anyhow!("Allocation {allocation_id} not found");
        let alloc = self.db.get_allocation(allocation_id)?.ok_or_else(not_found)?;
        let owner = self.db.get_category(alloc.category_id)?.map(|c| c.user_id);
        if owner != Some(user_id) {
            return Err(not_found());
        }
        Ok(alloc)
    }

    fn allocation_period(&self, allocation_id: i64) -> Result<Period> {
        Ok(self
            .db
            .get_allocation(allocation_id)?
            .ok_or_else(|| anyhow::anyhow!("Allocation {allocation_id} not found"))?
            .period)
    }
}

#[cfg(test)]
mod tests;
