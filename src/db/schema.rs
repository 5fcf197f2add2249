pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id  INTEGER NOT NULL REFERENCES users(id),
    name     TEXT NOT NULL,
    UNIQUE(user_id, name)
);

CREATE TABLE IF NOT EXISTS category_allocations (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    category_id      INTEGER NOT NULL REFERENCES categories(id),
    year             INTEGER NOT NULL,
    month            INTEGER NOT NULL,
    budgeted_amount  TEXT NOT NULL,
    UNIQUE(category_id, year, month)
);

CREATE TABLE IF NOT EXISTS transactions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES users(id),
    date         TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transaction_splits (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id          INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    category_allocation_id  INTEGER REFERENCES category_allocations(id),
    amount                  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
CREATE INDEX IF NOT EXISTS idx_splits_transaction ON transaction_splits(transaction_id);
CREATE INDEX IF NOT EXISTS idx_splits_allocation ON transaction_splits(category_allocation_id);

CREATE TABLE IF NOT EXISTS budget_snapshots (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          INTEGER NOT NULL REFERENCES users(id),
    year             INTEGER NOT NULL,
    month            INTEGER NOT NULL,
    ready_to_assign  TEXT NOT NULL,
    is_valid         BOOLEAN NOT NULL DEFAULT 1,
    computed_at      TEXT NOT NULL,
    UNIQUE(user_id, year, month)
);

CREATE TABLE IF NOT EXISTS snapshot_categories (
    snapshot_id  INTEGER NOT NULL REFERENCES budget_snapshots(id) ON DELETE CASCADE,
    position     INTEGER NOT NULL,
    category_id  INTEGER NOT NULL,
    assigned     TEXT NOT NULL,
    activity     TEXT NOT NULL,
    available    TEXT NOT NULL,
    PRIMARY KEY(snapshot_id, position)
);

"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];
