use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Merchant placeholder used when no extractor could name the counterparty
pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

/// Reserved account suffix for messages that only identify a UPI handle
pub const UPI_ACCOUNT_SUFFIX: &str = "UPI";

/// Direction of money movement, seen from the account holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    Debit,
    Credit,
    Unknown,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse used for model output and database rows
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debit" | "dr" | "withdrawal" => Some(Self::Debit),
            "credit" | "cr" | "deposit" => Some(Self::Credit),
            "unknown" | "" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// How a transaction (or a parsing attempt) was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    PrimaryModel,
    Deterministic,
    Vision,
    Manual,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryModel => "primary-model",
            Self::Deterministic => "deterministic",
            Self::Vision => "vision",
            Self::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary-model" => Some(Self::PrimaryModel),
            "deterministic" => Some(Self::Deterministic),
            "vision" => Some(Self::Vision),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Canonical financial transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    pub id: String,

    // Source
    pub raw_text: String,
    pub source_id: Option<String>,

    // Money
    /// Magnitude in base currency; direction lives in `transaction_type`
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub original_currency: Option<String>,
    pub original_amount: Option<f64>,
    pub balance: Option<f64>,

    // Counterparty
    pub merchant: String,
    pub category: String,
    /// Last four digits, the UPI sentinel, or nothing
    pub account_suffix: Option<String>,
    /// Reference printed by the bank (UPI ref, UTR, txn id)
    pub transaction_ref: Option<String>,

    /// Unix seconds of the event itself
    pub occurred_at: i64,

    // Extraction metadata
    pub is_parsed: bool,
    pub manually_edited: bool,
    pub extraction_method: ExtractionMethod,
    pub confidence: f64,
    pub extraction_error: Option<String>,
    pub created_at: i64,
}

impl Transaction {
    /// Fresh, unparsed record for `raw_text`; extractors fill in the rest
    pub fn blank(raw_text: &str, method: ExtractionMethod) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            raw_text: raw_text.to_string(),
            source_id: None,
            amount: 0.0,
            transaction_type: TransactionType::Unknown,
            original_currency: None,
            original_amount: None,
            balance: None,
            merchant: UNKNOWN_MERCHANT.to_string(),
            category: String::new(),
            account_suffix: None,
            transaction_ref: None,
            occurred_at: now,
            is_parsed: false,
            manually_edited: false,
            extraction_method: method,
            confidence: 0.0,
            extraction_error: None,
            created_at: now,
        }
    }

    /// UTC calendar day of `occurred_at`
    pub fn occurred_on(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp(self.occurred_at, 0)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }

    pub fn has_known_merchant(&self) -> bool {
        !self.merchant.trim().is_empty() && self.merchant != UNKNOWN_MERCHANT
    }

    /// Record a conversion from `currency`; `amount` becomes the base value
    pub fn apply_conversion(&mut self, currency: &str, original_amount: f64, converted: f64) {
        self.original_currency = Some(currency.to_string());
        self.original_amount = Some(original_amount);
        self.amount = converted;
    }
}

/// One field a pattern cascade recovered, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct MatchedPattern {
    pub field: String,
    pub pattern: String,
    pub value: String,
}

/// Method-specific detail attached to a parsing attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParsingDiagnostics {
    Model {
        model: String,
        extraction_response: String,
        raw_response: String,
    },
    Patterns {
        matched: Vec<MatchedPattern>,
        primary_failure: Option<String>,
    },
    None,
}

/// Outcome of one extraction attempt; never persisted on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ParsingResult {
    pub success: bool,
    pub method: ExtractionMethod,
    pub transaction: Option<Transaction>,
    pub error: Option<String>,
    pub elapsed_ms: i64,
    pub confidence: f64,
    /// The text carried an event date; otherwise `occurred_at` is extraction time
    #[serde(default)]
    pub event_date_found: bool,
    pub diagnostics: ParsingDiagnostics,
}

/// Filter for scanning the transaction store
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TransactionFilter {
    pub merchant: Option<String>,
    pub category: Option<String>,
    /// Inclusive lower bound, unix seconds
    pub from: Option<i64>,
    /// Exclusive upper bound, unix seconds
    pub to: Option<i64>,
    pub limit: Option<usize>,
}

/// User edit of a stored transaction
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateTransactionRequest {
    pub category: Option<String>,
    pub merchant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ParseTextRequest {
    pub text: String,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct IngestTextRequest {
    pub text: String,
    pub subject: Option<String>,
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IngestTextResponse {
    pub transaction: Transaction,
    pub duplicate: bool,
    pub parsing: ParsingResult,
}

/// One rendered statement page, base64 encoded
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ParseStatementImageRequest {
    pub image_base64: String,
    pub mime_type: Option<String>,
    #[serde(default)]
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StatementCandidate {
    pub transaction: Transaction,
    /// Only meaningful when the request asked to persist
    pub duplicate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementImageResponse {
    pub candidates: Vec<StatementCandidate>,
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeleteTransactionsResponse {
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_serialization() {
        let json = serde_json::to_string(&TransactionType::Debit).unwrap();
        assert_eq!(json, "\"debit\"");
        assert_eq!(TransactionType::parse("CREDIT"), Some(TransactionType::Credit));
        assert_eq!(TransactionType::parse("sideways"), None);
    }

    #[test]
    fn test_extraction_method_round_trip_through_str() {
        for method in [
            ExtractionMethod::PrimaryModel,
            ExtractionMethod::Deterministic,
            ExtractionMethod::Vision,
            ExtractionMethod::Manual,
        ] {
            assert_eq!(ExtractionMethod::parse(method.as_str()), Some(method));
        }
        let json = serde_json::to_string(&ExtractionMethod::PrimaryModel).unwrap();
        assert_eq!(json, "\"primary-model\"");
    }

    #[test]
    fn test_type_field_is_serialized_as_type() {
        let txn = Transaction::blank("Rs 10 debited", ExtractionMethod::Deterministic);
        let value = serde_json::to_value(&txn).unwrap();
        assert_eq!(value["type"], "unknown");
        assert_eq!(value["merchant"], UNKNOWN_MERCHANT);
    }

    #[test]
    fn test_occurred_on_uses_utc_day() {
        let mut txn = Transaction::blank("x", ExtractionMethod::Manual);
        // 2025-09-25T23:30:00Z
        txn.occurred_at = 1758843000;
        assert_eq!(txn.occurred_on(), NaiveDate::from_ymd_opt(2025, 9, 25).unwrap());
    }

    #[test]
    fn test_apply_conversion_keeps_original() {
        let mut txn = Transaction::blank("USD 10", ExtractionMethod::Deterministic);
        txn.amount = 10.0;
        txn.apply_conversion("USD", 10.0, 830.0);
        assert_eq!(txn.original_currency.as_deref(), Some("USD"));
        assert_eq!(txn.original_amount, Some(10.0));
        assert_eq!(txn.amount, 830.0);
    }
}
