use rusqlite::{params, Connection};
use shared_types::DEFAULT_CATEGORIES;

/// Creates the ledger tables used by the agents storage and seeds categories.
/// Safe to call on every start.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            raw_text TEXT NOT NULL,
            source_id TEXT,
            amount REAL NOT NULL,
            transaction_type TEXT NOT NULL,
            original_currency TEXT,
            original_amount REAL,
            balance REAL,
            merchant TEXT NOT NULL,
            category TEXT NOT NULL,
            account_suffix TEXT,
            transaction_ref TEXT,
            occurred_at INTEGER NOT NULL,
            is_parsed INTEGER NOT NULL DEFAULT 0,
            manually_edited INTEGER NOT NULL DEFAULT 0,
            extraction_method TEXT NOT NULL,
            confidence REAL NOT NULL,
            extraction_error TEXT,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_raw_text ON transactions(raw_text)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_ref ON transactions(transaction_ref)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_occurred_at ON transactions(occurred_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_merchant ON transactions(merchant)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            merchant TEXT NOT NULL UNIQUE COLLATE NOCASE,
            category TEXT NOT NULL,
            average_amount REAL NOT NULL,
            average_interval_days REAL NOT NULL,
            first_occurrence INTEGER NOT NULL,
            last_occurrence INTEGER NOT NULL,
            next_expected INTEGER,
            occurrence_count INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            frequency TEXT NOT NULL,
            confidence REAL NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exchange_rates (
            currency_code TEXT PRIMARY KEY,
            rate REAL NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            name TEXT PRIMARY KEY,
            is_active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    for (idx, name) in DEFAULT_CATEGORIES.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO categories (name, is_active, sort_order) VALUES (?, 1, ?)",
            params![name, idx as i64],
        )?;
    }

    Ok(())
}
