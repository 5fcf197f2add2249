use rust_decimal::Decimal;

use super::Period;

/// Money budgeted into one category for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub id: Option<i64>,
    pub category_id: i64,
    pub period: Period,
    pub budgeted_amount: Decimal,
}

impl Allocation {
    pub fn new(category_id: i64, period: Period, budgeted_amount: Decimal) -> Self {
        Self {
            id: None,
            category_id,
            period,
            budgeted_amount,
        }
    }
}
