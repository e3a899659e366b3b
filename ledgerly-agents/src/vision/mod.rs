//! Statement page images to transaction candidates.

use crate::llm::{complete_with_deadline, CompletionRequest, LlmClient};
use crate::storage::CategoryProvider;
use crate::transaction_extractor::types::{lenient_number, optional_string, strip_code_fences};
use extractors::financial_patterns::{midnight_utc, parse_date};
use extractors::{resolve_category, CategoryClassifier};
use serde_json::{Map, Value};
use shared_types::{
    default_category_names, ExtractionError, ExtractionMethod, Transaction, TransactionType,
    UNKNOWN_MERCHANT,
};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ROW_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub model: String,
    pub request_timeout: Duration,
    /// Pause between pages of one statement
    pub page_delay: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            request_timeout: Duration::from_secs(60),
            page_delay: Duration::from_millis(500),
        }
    }
}

/// One rendered page plus its MIME type
#[derive(Debug, Clone)]
pub struct StatementPage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

pub struct VisionStatementExtractor {
    config: VisionConfig,
    llm: Arc<dyn LlmClient>,
    categories: Arc<dyn CategoryProvider>,
    classifier: CategoryClassifier,
}

impl VisionStatementExtractor {
    pub fn new(
        config: VisionConfig,
        llm: Arc<dyn LlmClient>,
        categories: Arc<dyn CategoryProvider>,
    ) -> Self {
        Self {
            config,
            llm,
            categories,
            classifier: CategoryClassifier::new(),
        }
    }

    /// Candidates on one page; failures are logged and yield nothing
    pub async fn parse_page(&self, image: &[u8], mime_type: &str) -> Vec<Transaction> {
        let categories = match self.categories.active_categories().await {
            Ok(c) if !c.is_empty() => c,
            Ok(_) => default_category_names(),
            Err(e) => {
                tracing::error!("Failed to load categories, using defaults: {}", e);
                default_category_names()
            }
        };

        let request = CompletionRequest::text(&self.config.model, build_vision_prompt(&categories))
            .with_image(mime_type, image.to_vec())
            .json();

        let response =
            match complete_with_deadline(self.llm.as_ref(), request, self.config.request_timeout)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Statement page extraction failed: {}", e);
                    return Vec::new();
                }
            };

        match decode_rows(&response.text) {
            Ok(rows) => {
                let transactions: Vec<Transaction> = rows
                    .iter()
                    .filter_map(|row| self.row_to_transaction(row, &categories))
                    .collect();
                tracing::info!(
                    "Statement page yielded {} of {} rows",
                    transactions.len(),
                    rows.len()
                );
                transactions
            }
            Err(e) => {
                tracing::warn!("Statement page response rejected: {}", e);
                Vec::new()
            }
        }
    }

    /// Pages in order, pausing between model calls
    pub async fn parse_statement(&self, pages: &[StatementPage]) -> Vec<Transaction> {
        let mut all = Vec::new();
        for (idx, page) in pages.iter().enumerate() {
            if idx > 0 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
            all.extend(self.parse_page(&page.data, &page.mime_type).await);
        }
        all
    }

    fn row_to_transaction(
        &self,
        row: &Map<String, Value>,
        categories: &[String],
    ) -> Option<Transaction> {
        let (amount, column_type) = row_amount(row)?;
        if !(amount.is_finite() && amount > 0.0) {
            tracing::debug!("Dropping statement row without a positive amount: {:?}", row);
            return None;
        }

        let transaction_type = optional_string(row, "type")
            .and_then(|t| TransactionType::parse(&t))
            .filter(|t| *t != TransactionType::Unknown)
            .or(column_type)
            .unwrap_or(TransactionType::Unknown);

        let merchant = optional_string(row, "merchant")
            .or_else(|| optional_string(row, "description"))
            .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());
        let date_text = optional_string(row, "date");

        let raw_text = format!(
            "{} | {} | {} | {:.2}",
            date_text.as_deref().unwrap_or("-"),
            optional_string(row, "description").unwrap_or_else(|| merchant.clone()),
            transaction_type.as_str(),
            amount
        );

        let mut transaction = Transaction::blank(&raw_text, ExtractionMethod::Vision);
        transaction.amount = amount;
        transaction.transaction_type = transaction_type;
        transaction.category = optional_string(row, "category")
            .and_then(|c| resolve_category(&c, categories))
            .unwrap_or_else(|| self.classifier.classify(&merchant, categories));
        transaction.merchant = merchant;
        transaction.balance = row.get("balance").and_then(lenient_number);
        transaction.transaction_ref = optional_string(row, "transaction_id");
        if let Some(ts) = date_text.as_deref().and_then(parse_date).and_then(midnight_utc) {
            transaction.occurred_at = ts;
        }
        transaction.confidence = row
            .get("confidence")
            .and_then(Value::as_f64)
            .filter(|c| (0.0..=1.0).contains(c))
            .unwrap_or(DEFAULT_ROW_CONFIDENCE);
        transaction.is_parsed = transaction_type != TransactionType::Unknown;
        Some(transaction)
    }
}

/// First non-zero of `amount`, `debit`, `credit`; the debit/credit column
/// also fixes the direction
fn row_amount(row: &Map<String, Value>) -> Option<(f64, Option<TransactionType>)> {
    [
        ("amount", None),
        ("debit", Some(TransactionType::Debit)),
        ("credit", Some(TransactionType::Credit)),
    ]
    .into_iter()
    .find_map(|(column, column_type)| {
        row.get(column)
            .and_then(lenient_number)
            .map(f64::abs)
            .filter(|amount| *amount > 0.0)
            .map(|amount| (amount, column_type))
    })
}

/// Accepts `{transactions: [...]}`, a bare array, or a single object
fn decode_rows(text: &str) -> Result<Vec<Map<String, Value>>, ExtractionError> {
    let value: Value = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| ExtractionError::Schema(format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("transactions") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ExtractionError::Schema(
                    "transactions is not an array".to_string(),
                ))
            }
            None => vec![Value::Object(object)],
        },
        other => {
            return Err(ExtractionError::Schema(format!(
                "unexpected response: {}",
                other
            )))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect())
}

fn build_vision_prompt(categories: &[String]) -> String {
    format!(
        r#"This image is one page of a bank or credit card statement.

List every transaction row on the page as JSON:
{{"transactions": [{{"date": "YYYY-MM-DD", "description": "...", "merchant": "...", "amount": 0.0, "type": "debit|credit", "category": "...", "balance": null, "transaction_id": null, "confidence": 0.0}}]}}

- amount is the absolute value of the row, as a number without separators
- type is "debit" for money leaving the account holder's account, "credit" for money coming in
- category must be one of [{}]
- skip opening/closing balance rows, totals and headers
- return {{"transactions": []}} when the page has no transactions"#,
        categories.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{Scripted, ScriptedLlm};
    use crate::llm::LlmError;
    use crate::storage::StaticCategories;

    fn extractor(replies: Vec<Scripted>) -> (VisionStatementExtractor, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm::new(replies));
        let extractor = VisionStatementExtractor::new(
            VisionConfig {
                page_delay: Duration::ZERO,
                ..Default::default()
            },
            llm.clone(),
            Arc::new(StaticCategories(default_category_names())),
        );
        (extractor, llm)
    }

    #[tokio::test]
    async fn test_wrapped_rows() {
        let (extractor, llm) = extractor(vec![Scripted::Reply(
            r#"{"transactions": [
                {"date": "2025-09-25", "description": "ZOMATO ORDER", "merchant": "Zomato", "amount": "1,400.00", "type": "debit", "category": "Food & Dining"},
                {"date": "2025-09-26", "description": "SALARY SEP", "amount": 50000, "type": "credit", "confidence": 0.95}
            ]}"#,
        )]);

        let rows = extractor.parse_page(b"png-bytes", "image/png").await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, 1400.0);
        assert_eq!(rows[0].category, "Food & Dining");
        assert_eq!(rows[0].extraction_method, ExtractionMethod::Vision);
        assert_eq!(rows[0].confidence, DEFAULT_ROW_CONFIDENCE);
        assert_eq!(rows[1].transaction_type, TransactionType::Credit);
        assert_eq!(rows[1].confidence, 0.95);

        let requests = llm.requests.lock().unwrap();
        assert!(matches!(
            requests[0].parts[1],
            crate::llm::ContentPart::InlineImage { .. }
        ));
    }

    #[tokio::test]
    async fn test_bare_array_and_single_object() {
        let (extractor, _) = extractor(vec![
            Scripted::Reply(r#"[{"description": "UBER TRIP", "debit": "2,150.50"}]"#),
            Scripted::Reply(r#"```json
{"description": "NETFLIX", "amount": 649, "type": "debit"}
```"#),
        ]);

        let first = extractor.parse_page(b"a", "image/png").await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].amount, 2150.5);
        assert_eq!(first[0].transaction_type, TransactionType::Debit);

        let second = extractor.parse_page(b"b", "image/jpeg").await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].merchant, "NETFLIX");
    }

    #[tokio::test]
    async fn test_rows_without_amount_are_dropped() {
        let (extractor, _) = extractor(vec![Scripted::Reply(
            r#"[{"description": "Opening balance"}, {"description": "Fee", "amount": 0}, {"description": "ATM", "amount": 500, "type": "debit"}]"#,
        )]);
        let rows = extractor.parse_page(b"a", "image/png").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].merchant, "ATM");
    }

    #[tokio::test]
    async fn test_zero_debit_column_falls_through_to_credit() {
        let (extractor, _) = extractor(vec![Scripted::Reply(
            r#"[{"date": "2025-09-30", "description": "SALARY SEP", "debit": "0.00", "credit": "50,000.00"}]"#,
        )]);
        let rows = extractor.parse_page(b"a", "image/png").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 50000.0);
        assert_eq!(rows[0].transaction_type, TransactionType::Credit);
        assert!(rows[0].is_parsed);
    }

    #[tokio::test]
    async fn test_failures_yield_empty_list() {
        let (extractor, _) = extractor(vec![
            Scripted::Fail(LlmError::EmptyResponse),
            Scripted::Reply("the page is blurry"),
        ]);
        assert!(extractor.parse_page(b"a", "image/png").await.is_empty());
        assert!(extractor.parse_page(b"a", "image/png").await.is_empty());
    }

    #[tokio::test]
    async fn test_statement_runs_pages_in_order() {
        let (extractor, llm) = extractor(vec![
            Scripted::Reply(r#"[{"description": "A", "amount": 1, "type": "debit"}]"#),
            Scripted::Reply(r#"{"transactions": []}"#),
            Scripted::Reply(r#"[{"description": "C", "amount": 3, "type": "credit"}]"#),
        ]);
        let page = |b: &[u8]| StatementPage {
            data: b.to_vec(),
            mime_type: "image/png".to_string(),
        };

        let rows = extractor
            .parse_statement(&[page(b"1"), page(b"2"), page(b"3")])
            .await;
        assert_eq!(llm.call_count(), 3);
        assert_eq!(
            rows.iter().map(|r| r.merchant.as_str()).collect::<Vec<_>>(),
            vec!["A", "C"]
        );
    }
}
