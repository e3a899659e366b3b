//! Duplicate gate in front of the transaction store.
//!
//! Identity is checked in three tiers: identical raw text, identical bank
//! reference, then same amount/merchant/type/account on the same UTC day.
//! The last tier is a heuristic and will also collapse two genuine
//! same-day purchases of the same amount at the same merchant.

use crate::storage::TransactionStore;
use anyhow::Result;
use shared_types::Transaction;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateRule {
    RawText,
    TransactionRef,
    SameDayMatch,
}

impl DuplicateRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawText => "raw-text",
            Self::TransactionRef => "transaction-ref",
            Self::SameDayMatch => "same-day-match",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Transaction),
    Duplicate {
        existing: Transaction,
        rule: DuplicateRule,
    },
}

impl InsertOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Inserted(t) => t,
            Self::Duplicate { existing, .. } => existing,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            Self::Inserted(t) => t,
            Self::Duplicate { existing, .. } => existing,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

pub struct DeduplicationEngine {
    store: Arc<dyn TransactionStore>,
}

impl DeduplicationEngine {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Stored match for `candidate`, if any, with the rule that fired
    pub async fn find_duplicate(
        &self,
        candidate: &Transaction,
    ) -> Result<Option<(Transaction, DuplicateRule)>> {
        if let Some(existing) = self.store.find_by_raw_text(&candidate.raw_text).await? {
            return Ok(Some((existing, DuplicateRule::RawText)));
        }

        if let Some(reference) = candidate
            .transaction_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        {
            if let Some(existing) = self.store.find_by_transaction_ref(reference).await? {
                return Ok(Some((existing, DuplicateRule::TransactionRef)));
            }
        }

        let same_day = self.store.list_on_day(candidate.occurred_on()).await?;
        Ok(same_day
            .into_iter()
            .find(|existing| same_event(existing, candidate))
            .map(|existing| (existing, DuplicateRule::SameDayMatch)))
    }

    /// Persists `candidate` unless a stored transaction already represents it
    pub async fn insert(&self, candidate: Transaction) -> Result<InsertOutcome> {
        if let Some((existing, rule)) = self.find_duplicate(&candidate).await? {
            tracing::debug!(
                "Duplicate of {} by {} rule, skipping insert",
                existing.id,
                rule.as_str()
            );
            return Ok(InsertOutcome::Duplicate { existing, rule });
        }

        self.store.insert_transaction(&candidate).await?;
        tracing::debug!("Stored transaction {}", candidate.id);
        Ok(InsertOutcome::Inserted(candidate))
    }
}

fn same_event(existing: &Transaction, candidate: &Transaction) -> bool {
    existing.amount == candidate.amount
        && existing.merchant == candidate.merchant
        && existing.transaction_type == candidate.transaction_type
        && existing.account_suffix == candidate.account_suffix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteLedgerStorage;
    use shared_types::{ExtractionMethod, TransactionFilter, TransactionType};

    fn engine() -> (DeduplicationEngine, Arc<SqliteLedgerStorage>) {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        (DeduplicationEngine::new(store.clone()), store)
    }

    fn txn(raw: &str, amount: f64, merchant: &str, occurred_at: i64) -> Transaction {
        let mut t = Transaction::blank(raw, ExtractionMethod::Deterministic);
        t.amount = amount;
        t.merchant = merchant.to_string();
        t.transaction_type = TransactionType::Debit;
        t.account_suffix = Some("2008".to_string());
        t.category = "Other".to_string();
        t.occurred_at = occurred_at;
        t
    }

    // 2025-09-25T10:00:00Z
    const DAY: i64 = 1758794400;

    async fn stored_count(store: &SqliteLedgerStorage) -> usize {
        store
            .filter_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_same_raw_text_twice_stores_once() {
        let (engine, store) = engine();
        let raw = "Rs 1,400.00 spent using ICICI Bank Card XX2008 on 25-Sep-25 at ZOMATO.";

        let first = engine.insert(txn(raw, 1400.0, "Zomato", DAY)).await.unwrap();
        let second = engine
            .insert(txn(raw, 1400.0, "Zomato", DAY + 60))
            .await
            .unwrap();

        assert!(!first.is_duplicate());
        assert!(matches!(
            second,
            InsertOutcome::Duplicate { rule: DuplicateRule::RawText, .. }
        ));
        assert_eq!(second.transaction(), first.transaction());
        assert_eq!(stored_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_reference_match_across_wording() {
        let (engine, store) = engine();
        let mut a = txn("Paid Rs 99 to Swiggy, UPI Ref 512345678901", 99.0, "Swiggy", DAY);
        a.transaction_ref = Some("512345678901".to_string());
        let mut b = txn("Rs.99.00 debited for Swiggy. Ref 512345678901", 99.0, "SWIGGY", DAY - 86_400 * 3);
        b.transaction_ref = Some("512345678901".to_string());

        engine.insert(a).await.unwrap();
        let outcome = engine.insert(b).await.unwrap();

        assert!(matches!(
            outcome,
            InsertOutcome::Duplicate { rule: DuplicateRule::TransactionRef, .. }
        ));
        assert_eq!(stored_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_same_day_heuristic() {
        let (engine, store) = engine();
        engine
            .insert(txn("Rs 250 at Cafe, 10am", 250.0, "Cafe", DAY))
            .await
            .unwrap();

        let repeat = engine
            .insert(txn("Rs 250 at Cafe, 6pm", 250.0, "Cafe", DAY + 8 * 3600))
            .await
            .unwrap();
        assert!(matches!(
            repeat,
            InsertOutcome::Duplicate { rule: DuplicateRule::SameDayMatch, .. }
        ));

        let next_day = engine
            .insert(txn("Rs 250 at Cafe, next day", 250.0, "Cafe", DAY + 86_400))
            .await
            .unwrap();
        assert!(!next_day.is_duplicate());

        let other_card = {
            let mut t = txn("Rs 250 at Cafe, other card", 250.0, "Cafe", DAY);
            t.account_suffix = Some("9006".to_string());
            t
        };
        assert!(!engine.insert(other_card).await.unwrap().is_duplicate());
        assert_eq!(stored_count(&store).await, 3);
    }

    #[tokio::test]
    async fn test_blank_reference_is_ignored() {
        let (engine, _) = engine();
        let mut a = txn("first", 10.0, "A", DAY);
        a.transaction_ref = Some(" ".to_string());
        let mut b = txn("second", 20.0, "B", DAY);
        b.transaction_ref = Some(" ".to_string());

        engine.insert(a).await.unwrap();
        assert!(!engine.insert(b).await.unwrap().is_duplicate());
    }
}
