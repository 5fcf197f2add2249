use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::Period;

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Option<i64>,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub created_at: String,
}

impl Transaction {
    pub fn new(user_id: i64, date: NaiveDate, description: String) -> Self {
        Self {
            id: None,
            user_id,
            date,
            description,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn period(&self) -> Period {
        Period::from_date(self.date)
    }
}

/// A portion of a transaction. Splits without an allocation are income;
/// splits linked to an allocation count as activity against its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub id: Option<i64>,
    pub transaction_id: i64,
    pub category_allocation_id: Option<i64>,
    pub amount: Decimal,
    /// Month of the parent transaction's date.
    pub period: Period,
}

impl Split {
    pub fn is_income(&self) -> bool {
        self.category_allocation_id.is_none()
    }
}

/// A split as submitted for a new transaction, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSplit {
    pub category_allocation_id: Option<i64>,
    pub amount: Decimal,
}
