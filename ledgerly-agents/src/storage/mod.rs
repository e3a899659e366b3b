pub mod schema;
pub mod sqlite_storage;

pub use schema::initialize_schema;
pub use sqlite_storage::SqliteLedgerStorage;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use shared_types::{
    Category, ExchangeRateCacheEntry, RecurringTransaction, Transaction, TransactionFilter,
    UpdateTransactionRequest,
};

/// Append-mostly transaction log
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()>;
    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>>;
    async fn find_by_raw_text(&self, raw_text: &str) -> Result<Option<Transaction>>;
    async fn find_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Transaction>>;
    /// Transactions whose `occurred_at` falls on `day` (UTC)
    async fn list_on_day(&self, day: NaiveDate) -> Result<Vec<Transaction>>;
    /// Full scan, oldest first
    async fn list_transactions(&self) -> Result<Vec<Transaction>>;
    /// Newest first
    async fn filter_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;
    /// Applies a user edit and sets `manually_edited`
    async fn update_transaction(
        &self,
        id: &str,
        update: &UpdateTransactionRequest,
    ) -> Result<Option<Transaction>>;
    async fn delete_transaction(&self, id: &str) -> Result<bool>;
    /// Deletes `from <= occurred_at < to`, returning the count
    async fn delete_transactions_between(&self, from: i64, to: i64) -> Result<usize>;
}

#[async_trait]
pub trait RecurringStore: Send + Sync {
    /// Insert or update keyed by merchant; a stored inactive flag survives
    async fn upsert_recurring(&self, recurring: &RecurringTransaction)
        -> Result<RecurringTransaction>;
    async fn list_recurring(&self) -> Result<Vec<RecurringTransaction>>;
    async fn set_recurring_active(&self, id: i64, is_active: bool) -> Result<bool>;
    async fn delete_recurring(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait RateStore: Send + Sync {
    async fn load_rates(&self) -> Result<Vec<ExchangeRateCacheEntry>>;
    /// Replaces the whole table
    async fn replace_rates(&self, rates: &[ExchangeRateCacheEntry]) -> Result<()>;
}

/// Source of the active category names
#[async_trait]
pub trait CategoryProvider: Send + Sync {
    async fn active_categories(&self) -> Result<Vec<String>>;
}

/// Fixed category list, for the CLI without a database and for tests
pub struct StaticCategories(pub Vec<String>);

#[async_trait]
impl CategoryProvider for StaticCategories {
    async fn active_categories(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Category management on top of [`CategoryProvider`]
#[async_trait]
pub trait CategoryStore: CategoryProvider {
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn upsert_category(&self, name: &str, is_active: Option<bool>) -> Result<Category>;
}
