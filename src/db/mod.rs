mod schema;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::engine::{AllocationProvider, SnapshotStore, TransactionProvider, UserActivityProvider};
use crate::models::*;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database - apply full schema
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────

    /// Look up a user by name, creating it on first use.
    pub fn ensure_user(&self, name: &str) -> Result<User> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (name) VALUES (?1)",
            params![name],
        )?;
        self.get_user_by_name(name)?
            .ok_or_else(|| anyhow::anyhow!("User '{name}' missing after insert"))
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM users WHERE name = ?1",
                params![name],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    // ── Categories ────────────────────────────────────────────

    pub fn insert_category(&self, cat: &Category) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO categories (user_id, name) VALUES (?1, ?2)",
                params![cat.user_id, cat.name],
            )
            .with_context(|| format!("Failed to create category '{}'", cat.name))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_categories(&self, user_id: i64) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, name FROM categories WHERE user_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Category {
                id: Some(row.get(0)?),
                user_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, name FROM categories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Category {
                        id: Some(row.get(0)?),
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn get_category_by_name(&self, user_id: i64, name: &str) -> Result<Option<Category>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, name FROM categories WHERE user_id = ?1 AND name = ?2 COLLATE NOCASE",
                params![user_id, name],
                |row| {
                    Ok(Category {
                        id: Some(row.get(0)?),
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    // ── Allocations ───────────────────────────────────────────

    /// Insert or replace the budgeted amount for (category, period). Returns the row id.
    pub fn upsert_allocation(&self, alloc: &Allocation) -> Result<i64> {
        Ok(self.conn.query_row(
            "INSERT INTO category_allocations (category_id, year, month, budgeted_amount)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(category_id, year, month) DO UPDATE SET budgeted_amount = excluded.budgeted_amount
             RETURNING id",
            params![
                alloc.category_id,
                alloc.period.year(),
                alloc.period.month(),
                alloc.budgeted_amount.to_string(),
            ],
            |row| row.get(0),
        )?)
    }

    pub fn get_allocation(&self, id: i64) -> Result<Option<Allocation>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, category_id, year, month, budgeted_amount
                 FROM category_allocations WHERE id = ?1",
                params![id],
                allocation_from_row,
            )
            .optional()?)
    }

    pub fn get_allocation_for(&self, category_id: i64, period: Period) -> Result<Option<Allocation>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, category_id, year, month, budgeted_amount
                 FROM category_allocations WHERE category_id = ?1 AND year = ?2 AND month = ?3",
                params![category_id, period.year(), period.month()],
                allocation_from_row,
            )
            .optional()?)
    }

    // ── Transactions ──────────────────────────────────────────

    /// Insert a transaction and its splits atomically. Returns the transaction id.
    pub fn insert_transaction(&mut self, txn: &Transaction, splits: &[NewSplit]) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO transactions (user_id, date, description, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                txn.user_id,
                txn.date.format("%Y-%m-%d").to_string(),
                txn.description,
                txn.created_at,
            ],
        )?;
        let txn_id = tx.last_insert_rowid();
        for split in splits {
            tx.execute(
                "INSERT INTO transaction_splits (transaction_id, category_allocation_id, amount)
                 VALUES (?1, ?2, ?3)",
                params![txn_id, split.category_allocation_id, split.amount.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(txn_id)
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, date, description, created_at FROM transactions WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Transaction {
                        id: Some(row.get(0)?),
                        user_id: row.get(1)?,
                        date: date_column(row, 2)?,
                        description: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn get_splits_for_transaction(&self, transaction_id: i64) -> Result<Vec<Split>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SPLIT_SELECT} WHERE s.transaction_id = ?1 ORDER BY s.id"
        ))?;
        let rows = stmt.query_map(params![transaction_id], split_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_split(&self, id: i64) -> Result<Option<Split>> {
        Ok(self
            .conn
            .query_row(
                &format!("{SPLIT_SELECT} WHERE s.id = ?1"),
                params![id],
                split_from_row,
            )
            .optional()?)
    }

    pub fn update_split(
        &self,
        split_id: i64,
        amount: Decimal,
        category_allocation_id: Option<i64>,
    ) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE transaction_splits SET amount = ?1, category_allocation_id = ?2 WHERE id = ?3",
            params![amount.to_string(), category_allocation_id, split_id],
        )?;
        if changed == 0 {
            anyhow::bail!("Split {split_id} not found");
        }
        Ok(())
    }

    pub fn delete_transaction(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Snapshots ─────────────────────────────────────────────

    /// Every stored snapshot for the user, valid or not, oldest first.
    pub fn get_snapshots(&self, user_id: i64) -> Result<Vec<Snapshot>> {
        let headers = {
            let mut stmt = self.conn.prepare(
                "SELECT id, user_id, year, month, ready_to_assign, is_valid, computed_at
                 FROM budget_snapshots WHERE user_id = ?1 ORDER BY year, month",
            )?;
            let rows = stmt.query_map(params![user_id], snapshot_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        headers
            .into_iter()
            .map(|mut snapshot| -> Result<Snapshot> {
                if let Some(id) = snapshot.id {
                    snapshot.categories = self.snapshot_categories(id)?;
                }
                Ok(snapshot)
            })
            .collect()
    }

    fn snapshot_categories(&self, snapshot_id: i64) -> Result<Vec<CategoryState>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, assigned, activity, available
             FROM snapshot_categories WHERE snapshot_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![snapshot_id], |row| {
            Ok(CategoryState {
                category_id: row.get(0)?,
                assigned: decimal_column(row, 1)?,
                activity: decimal_column(row, 2)?,
                available: decimal_column(row, 3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

// ── Collaborator implementations ──────────────────────────────

impl AllocationProvider for Database {
    fn allocations_for_category(&self, category_id: i64) -> Result<Vec<Allocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, category_id, year, month, budgeted_amount
             FROM category_allocations WHERE category_id = ?1 ORDER BY year, month",
        )?;
        let rows = stmt.query_map(params![category_id], allocation_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn allocations_for_user(&self, user_id: i64) -> Result<Vec<Allocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.category_id, a.year, a.month, a.budgeted_amount
             FROM category_allocations a JOIN categories c ON a.category_id = c.id
             WHERE c.user_id = ?1
             ORDER BY a.category_id, a.year, a.month",
        )?;
        let rows = stmt.query_map(params![user_id], allocation_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl TransactionProvider for Database {
    fn splits_for_allocation(&self, allocation_id: i64) -> Result<Vec<Split>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SPLIT_SELECT} WHERE s.category_allocation_id = ?1 ORDER BY s.id"
        ))?;
        let rows = stmt.query_map(params![allocation_id], split_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn splits_by_period(&self, user_id: i64, period: Period) -> Result<Vec<Split>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SPLIT_SELECT} WHERE t.user_id = ?1 AND t.date LIKE ?2 ORDER BY s.id"
        ))?;
        let rows = stmt.query_map(params![user_id, period.date_pattern()], split_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl UserActivityProvider for Database {
    fn earliest_activity_date(&self, user_id: i64) -> Result<Option<NaiveDate>> {
        let earliest: Option<String> = self.conn.query_row(
            "SELECT MIN(date) FROM transactions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        earliest
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .with_context(|| format!("Invalid transaction date '{d}'"))
            })
            .transpose()
    }
}

impl SnapshotStore for Database {
    fn get(&self, user_id: i64, period: Period) -> Result<Option<Snapshot>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, user_id, year, month, ready_to_assign, is_valid, computed_at
                 FROM budget_snapshots WHERE user_id = ?1 AND year = ?2 AND month = ?3",
                params![user_id, period.year(), period.month()],
                snapshot_from_row,
            )
            .optional()?;
        let Some(mut snapshot) = header else {
            return Ok(None);
        };
        if let Some(id) = snapshot.id {
            snapshot.categories = self.snapshot_categories(id)?;
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<Snapshot> {
        let tx = self.conn.unchecked_transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO budget_snapshots (user_id, year, month, ready_to_assign, is_valid, computed_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)
             ON CONFLICT(user_id, year, month) DO UPDATE SET
                ready_to_assign = excluded.ready_to_assign,
                is_valid = 1,
                computed_at = excluded.computed_at
             RETURNING id",
            params![
                snapshot.user_id,
                snapshot.period.year(),
                snapshot.period.month(),
                snapshot.ready_to_assign.to_string(),
                snapshot.computed_at,
            ],
            |row| row.get(0),
        )?;
        tx.execute(
            "DELETE FROM snapshot_categories WHERE snapshot_id = ?1",
            params![id],
        )?;
        for (position, state) in snapshot.categories.iter().enumerate() {
            tx.execute(
                "INSERT INTO snapshot_categories (snapshot_id, position, category_id, assigned, activity, available)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    position as i64,
                    state.category_id,
                    state.assigned.to_string(),
                    state.activity.to_string(),
                    state.available.to_string(),
                ],
            )?;
        }
        tx.commit()
            .with_context(|| format!("Failed to save snapshot for {}", snapshot.period))?;

        self.get(snapshot.user_id, snapshot.period)?
            .ok_or_else(|| anyhow::anyhow!("Snapshot for {} missing after save", snapshot.period))
    }

    fn invalidate_from_period(&self, user_id: i64, period: Period) -> Result<()> {
        self.conn.execute(
            "UPDATE budget_snapshots SET is_valid = 0
             WHERE user_id = ?1 AND (year > ?2 OR (year = ?2 AND month >= ?3))",
            params![user_id, period.year(), period.month()],
        )?;
        Ok(())
    }
}

// ── Row mapping ───────────────────────────────────────────────

const SPLIT_SELECT: &str = "SELECT s.id, s.transaction_id, s.category_allocation_id, s.amount, t.date
     FROM transaction_splits s JOIN transactions t ON s.transaction_id = t.id";

fn split_from_row(row: &Row<'_>) -> rusqlite::Result<Split> {
    Ok(Split {
        id: Some(row.get(0)?),
        transaction_id: row.get(1)?,
        category_allocation_id: row.get(2)?,
        amount: decimal_column(row, 3)?,
        period: Period::from_date(date_column(row, 4)?),
    })
}

fn allocation_from_row(row: &Row<'_>) -> rusqlite::Result<Allocation> {
    Ok(Allocation {
        id: Some(row.get(0)?),
        category_id: row.get(1)?,
        period: period_columns(row, 2, 3)?,
        budgeted_amount: decimal_column(row, 4)?,
    })
}

/// Snapshot header only; categories are loaded separately.
fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        id: Some(row.get(0)?),
        user_id: row.get(1)?,
        period: period_columns(row, 2, 3)?,
        ready_to_assign: decimal_column(row, 4)?,
        categories: Vec::new(),
        is_valid: row.get(5)?,
        computed_at: row.get(6)?,
    })
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn period_columns(row: &Row<'_>, year_idx: usize, month_idx: usize) -> rusqlite::Result<Period> {
    let year: i32 = row.get(year_idx)?;
    let month: u32 = row.get(month_idx)?;
    Period::new(year, month)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(month_idx, Type::Integer, e.into()))
}
