use super::{
    CategoryProvider, CategoryStore, RateStore, RecurringStore, TransactionStore,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use shared_types::{
    Category, ExchangeRateCacheEntry, ExtractionMethod, Frequency, RecurringTransaction,
    Transaction, TransactionFilter, TransactionType, UpdateTransactionRequest,
};
use std::sync::{Arc, Mutex, MutexGuard};

const TRANSACTION_COLUMNS: &str = "id, raw_text, source_id, amount, transaction_type,
    original_currency, original_amount, balance, merchant, category, account_suffix,
    transaction_ref, occurred_at, is_parsed, manually_edited, extraction_method, confidence,
    extraction_error, created_at";

const RECURRING_COLUMNS: &str = "id, merchant, category, average_amount, average_interval_days,
    first_occurrence, last_occurrence, next_expected, occurrence_count, is_active, frequency,
    confidence";

/// All ledger stores over one shared SQLite connection
#[derive(Clone)]
pub struct SqliteLedgerStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedgerStorage {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Opens an in-memory database with the ledger schema
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::initialize_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("ledger database mutex poisoned"))
    }

    fn query_transactions(
        conn: &Connection,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Transaction>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, transaction_from_row)?;

        let mut transactions = Vec::new();
        for row_result in rows {
            transactions.push(row_result?);
        }
        Ok(transactions)
    }

    fn query_one_transaction(
        conn: &Connection,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<Transaction>> {
        Ok(conn.query_row(sql, params, transaction_from_row).optional()?)
    }
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let type_str: String = row.get(4)?;
    let method_str: String = row.get(15)?;

    Ok(Transaction {
        id: row.get(0)?,
        raw_text: row.get(1)?,
        source_id: row.get(2)?,
        amount: row.get(3)?,
        transaction_type: TransactionType::parse(&type_str).unwrap_or(TransactionType::Unknown),
        original_currency: row.get(5)?,
        original_amount: row.get(6)?,
        balance: row.get(7)?,
        merchant: row.get(8)?,
        category: row.get(9)?,
        account_suffix: row.get(10)?,
        transaction_ref: row.get(11)?,
        occurred_at: row.get(12)?,
        is_parsed: row.get(13)?,
        manually_edited: row.get(14)?,
        extraction_method: ExtractionMethod::parse(&method_str)
            .unwrap_or(ExtractionMethod::Deterministic),
        confidence: row.get(16)?,
        extraction_error: row.get(17)?,
        created_at: row.get(18)?,
    })
}

fn recurring_from_row(row: &Row) -> rusqlite::Result<RecurringTransaction> {
    let frequency: String = row.get(10)?;

    Ok(RecurringTransaction {
        id: row.get(0)?,
        merchant: row.get(1)?,
        category: row.get(2)?,
        average_amount: row.get(3)?,
        average_interval_days: row.get(4)?,
        first_occurrence: row.get(5)?,
        last_occurrence: row.get(6)?,
        next_expected: row.get(7)?,
        occurrence_count: row.get(8)?,
        is_active: row.get(9)?,
        frequency: Frequency::parse(&frequency),
        confidence: row.get(11)?,
    })
}

fn day_bounds(day: NaiveDate) -> Result<(i64, i64)> {
    let start = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid day {}", day))?
        .and_utc()
        .timestamp();
    Ok((start, start + 86_400))
}

#[async_trait]
impl TransactionStore for SqliteLedgerStorage {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            &format!(
                "INSERT INTO transactions ({})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TRANSACTION_COLUMNS
            ),
            params![
                &transaction.id,
                &transaction.raw_text,
                &transaction.source_id,
                transaction.amount,
                transaction.transaction_type.as_str(),
                &transaction.original_currency,
                transaction.original_amount,
                transaction.balance,
                &transaction.merchant,
                &transaction.category,
                &transaction.account_suffix,
                &transaction.transaction_ref,
                transaction.occurred_at,
                transaction.is_parsed,
                transaction.manually_edited,
                transaction.extraction_method.as_str(),
                transaction.confidence,
                &transaction.extraction_error,
                transaction.created_at,
            ],
        )?;

        Ok(())
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        Self::query_one_transaction(
            &conn,
            &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
            &[&id],
        )
    }

    async fn find_by_raw_text(&self, raw_text: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        Self::query_one_transaction(
            &conn,
            &format!(
                "SELECT {} FROM transactions WHERE raw_text = ? ORDER BY created_at ASC LIMIT 1",
                TRANSACTION_COLUMNS
            ),
            &[&raw_text],
        )
    }

    async fn find_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        Self::query_one_transaction(
            &conn,
            &format!(
                "SELECT {} FROM transactions WHERE transaction_ref = ? ORDER BY created_at ASC LIMIT 1",
                TRANSACTION_COLUMNS
            ),
            &[&transaction_ref],
        )
    }

    async fn list_on_day(&self, day: NaiveDate) -> Result<Vec<Transaction>> {
        let (start, end) = day_bounds(day)?;
        let conn = self.conn()?;
        Self::query_transactions(
            &conn,
            &format!(
                "SELECT {} FROM transactions
                 WHERE occurred_at >= ? AND occurred_at < ?
                 ORDER BY occurred_at ASC",
                TRANSACTION_COLUMNS
            ),
            &[&start, &end],
        )
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        Self::query_transactions(
            &conn,
            &format!(
                "SELECT {} FROM transactions ORDER BY occurred_at ASC, created_at ASC",
                TRANSACTION_COLUMNS
            ),
            &[],
        )
    }

    async fn filter_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut sql = format!("SELECT {} FROM transactions WHERE 1 = 1", TRANSACTION_COLUMNS);
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(merchant) = &filter.merchant {
            sql.push_str(" AND merchant = ? COLLATE NOCASE");
            values.push(Box::new(merchant.clone()));
        }
        if let Some(category) = &filter.category {
            sql.push_str(" AND category = ? COLLATE NOCASE");
            values.push(Box::new(category.clone()));
        }
        if let Some(from) = filter.from {
            sql.push_str(" AND occurred_at >= ?");
            values.push(Box::new(from));
        }
        if let Some(to) = filter.to {
            sql.push_str(" AND occurred_at < ?");
            values.push(Box::new(to));
        }
        sql.push_str(" ORDER BY occurred_at DESC, created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Box::new(limit as i64));
        }

        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let conn = self.conn()?;
        Self::query_transactions(&conn, &sql, &refs)
    }

    async fn update_transaction(
        &self,
        id: &str,
        update: &UpdateTransactionRequest,
    ) -> Result<Option<Transaction>> {
        let conn = self.conn()?;

        let changed = conn.execute(
            "UPDATE transactions
             SET category = COALESCE(?, category),
                 merchant = COALESCE(?, merchant),
                 manually_edited = 1
             WHERE id = ?",
            params![&update.category, &update.merchant, id],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        Self::query_one_transaction(
            &conn,
            &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
            &[&id],
        )
    }

    async fn delete_transaction(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transactions WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    async fn delete_transactions_between(&self, from: i64, to: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE occurred_at >= ? AND occurred_at < ?",
            [from, to],
        )?;
        Ok(deleted)
    }
}

#[async_trait]
impl RecurringStore for SqliteLedgerStorage {
    async fn upsert_recurring(
        &self,
        recurring: &RecurringTransaction,
    ) -> Result<RecurringTransaction> {
        let conn = self.conn()?;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO recurring_transactions
             (merchant, category, average_amount, average_interval_days, first_occurrence,
              last_occurrence, next_expected, occurrence_count, is_active, frequency, confidence,
              updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(merchant) DO UPDATE SET
                merchant = excluded.merchant,
                category = excluded.category,
                average_amount = excluded.average_amount,
                average_interval_days = excluded.average_interval_days,
                first_occurrence = excluded.first_occurrence,
                last_occurrence = excluded.last_occurrence,
                next_expected = excluded.next_expected,
                occurrence_count = excluded.occurrence_count,
                frequency = excluded.frequency,
                confidence = excluded.confidence,
                updated_at = excluded.updated_at",
            params![
                &recurring.merchant,
                &recurring.category,
                recurring.average_amount,
                recurring.average_interval_days,
                recurring.first_occurrence,
                recurring.last_occurrence,
                recurring.next_expected,
                recurring.occurrence_count,
                recurring.is_active,
                recurring.frequency.as_str(),
                recurring.confidence,
                now,
            ],
        )?;

        let stored = conn.query_row(
            &format!(
                "SELECT {} FROM recurring_transactions WHERE merchant = ? COLLATE NOCASE",
                RECURRING_COLUMNS
            ),
            [&recurring.merchant],
            recurring_from_row,
        )?;

        Ok(stored)
    }

    async fn list_recurring(&self) -> Result<Vec<RecurringTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM recurring_transactions ORDER BY confidence DESC, merchant ASC",
            RECURRING_COLUMNS
        ))?;

        let rows = stmt.query_map([], recurring_from_row)?;
        let mut recurring = Vec::new();
        for row_result in rows {
            recurring.push(row_result?);
        }
        Ok(recurring)
    }

    async fn set_recurring_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE recurring_transactions SET is_active = ? WHERE id = ?",
            params![is_active, id],
        )?;
        Ok(changed > 0)
    }

    async fn delete_recurring(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM recurring_transactions WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl RateStore for SqliteLedgerStorage {
    async fn load_rates(&self) -> Result<Vec<ExchangeRateCacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT currency_code, rate, updated_at FROM exchange_rates ORDER BY currency_code",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ExchangeRateCacheEntry {
                currency_code: row.get(0)?,
                rate: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;

        let mut rates = Vec::new();
        for row_result in rows {
            rates.push(row_result?);
        }
        Ok(rates)
    }

    async fn replace_rates(&self, rates: &[ExchangeRateCacheEntry]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM exchange_rates", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO exchange_rates (currency_code, rate, updated_at) VALUES (?, ?, ?)",
            )?;
            for entry in rates {
                stmt.execute(params![&entry.currency_code, entry.rate, entry.updated_at])?;
            }
        }
        tx.commit()?;

        Ok(())
    }
}

#[async_trait]
impl CategoryProvider for SqliteLedgerStorage {
    async fn active_categories(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM categories WHERE is_active = 1 ORDER BY sort_order, name",
        )?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row_result in rows {
            names.push(row_result?);
        }
        Ok(names)
    }
}

#[async_trait]
impl CategoryStore for SqliteLedgerStorage {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT name, is_active, sort_order FROM categories ORDER BY sort_order, name")?;

        let rows = stmt.query_map([], |row| {
            Ok(Category {
                name: row.get(0)?,
                is_active: row.get(1)?,
                sort_order: row.get(2)?,
            })
        })?;

        let mut categories = Vec::new();
        for row_result in rows {
            categories.push(row_result?);
        }
        Ok(categories)
    }

    async fn upsert_category(&self, name: &str, is_active: Option<bool>) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("category name must not be empty"));
        }

        let conn = self.conn()?;
        let next_order: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM categories",
            [],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO categories (name, is_active, sort_order) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET is_active = COALESCE(?, is_active)",
            params![name, is_active.unwrap_or(true), next_order, is_active],
        )?;

        let category = conn.query_row(
            "SELECT name, is_active, sort_order FROM categories WHERE name = ?",
            [name],
            |row| {
                Ok(Category {
                    name: row.get(0)?,
                    is_active: row.get(1)?,
                    sort_order: row.get(2)?,
                })
            },
        )?;

        Ok(category)
    }
}
