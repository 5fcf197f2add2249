use anyhow::Result;
use rust_decimal::Decimal;

use super::providers::{AllocationProvider, TransactionProvider};
use crate::models::Period;

/// Per-period income and newly-assigned totals for one user.
pub struct ActivityAggregator<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B> ActivityAggregator<'a, B>
where
    B: AllocationProvider + TransactionProvider + ?Sized,
{
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Sum of the user's unallocated splits dated within `period`.
    pub fn income(&self, user_id: i64, period: Period) -> Result<Decimal> {
        Ok(self
            .backend
            .splits_by_period(user_id, period)?
            .iter()
            .filter(|s| s.is_income())
            .map(|s| s.amount)
            .sum())
    }

    /// Sum budgeted in exactly `period`; not cumulative.
    pub fn allocations_total(&self, user_id: i64, period: Period) -> Result<Decimal> {
        Ok(self
            .backend
            .allocations_for_user(user_id)?
            .iter()
            .filter(|a| a.period == period)
            .map(|a| a.budgeted_amount)
            .sum())
    }
}
