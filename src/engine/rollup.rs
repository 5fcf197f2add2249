use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::providers::{AllocationProvider, TransactionProvider};
use crate::models::{Allocation, CategoryState, Period};

/// Per-category assigned/activity/available as of a period.
///
/// `assigned` covers the requested period only, while `activity` and
/// `available` are cumulative over every allocation at or before it.
/// Activity follows the allocation a split is linked to, not the split's date.
pub struct CategoryRollup<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B> CategoryRollup<'a, B>
where
    B: AllocationProvider + TransactionProvider + ?Sized,
{
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Categories without allocations at or before `period` are omitted.
    /// Results are ordered by category id.
    pub fn rollup(&self, user_id: i64, period: Period) -> Result<Vec<CategoryState>> {
        let mut by_category: BTreeMap<i64, Vec<Allocation>> = BTreeMap::new();
        for alloc in self.backend.allocations_for_user(user_id)? {
            if alloc.period <= period {
                by_category.entry(alloc.category_id).or_default().push(alloc);
            }
        }

        let mut states = Vec::with_capacity(by_category.len());
        for (category_id, allocations) in by_category {
            let mut assigned = Decimal::ZERO;
            let mut budgeted = Decimal::ZERO;
            let mut activity = Decimal::ZERO;
            for alloc in &allocations {
                budgeted += alloc.budgeted_amount;
                if alloc.period == period {
                    assigned += alloc.budgeted_amount;
                }
                if let Some(id) = alloc.id {
                    activity += self
                        .backend
                        .splits_for_allocation(id)?
                        .iter()
                        .map(|s| s.amount)
                        .sum::<Decimal>();
                }
            }
            states.push(CategoryState {
                category_id,
                assigned,
                activity,
                available: budgeted - activity,
            });
        }
        Ok(states)
    }
}
