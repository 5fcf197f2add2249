use rust_decimal::Decimal;

use super::Period;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryState {
    pub category_id: i64,
    /// Budgeted in this period only.
    pub assigned: Decimal,
    /// Cumulative split activity against the category's allocations.
    pub activity: Decimal,
    /// Cumulative budgeted minus cumulative activity; negative when overspent.
    pub available: Decimal,
}

impl CategoryState {
    pub fn is_overspent(&self) -> bool {
        self.available < Decimal::ZERO
    }
}

/// Computed budget state for one (user, period).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: Option<i64>,
    pub user_id: i64,
    pub period: Period,
    pub ready_to_assign: Decimal,
    pub categories: Vec<CategoryState>,
    pub is_valid: bool,
    pub computed_at: String,
}

impl Snapshot {
    pub fn new(
        user_id: i64,
        period: Period,
        ready_to_assign: Decimal,
        categories: Vec<CategoryState>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            period,
            ready_to_assign,
            categories,
            is_valid: true,
            computed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Sum of |available| over overspent categories, deducted from the next period's RTA.
    pub fn overspend(&self) -> Decimal {
        self.categories
            .iter()
            .filter(|c| c.is_overspent())
            .map(|c| c.available.abs())
            .sum()
    }
}
