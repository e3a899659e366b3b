use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::{ExtractionError, TransactionType, UPI_ACCOUNT_SUFFIX};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModelTransactionType {
    Debit,
    Credit,
    Unknown,
}

impl From<ModelTransactionType> for TransactionType {
    fn from(value: ModelTransactionType) -> Self {
        match value {
            ModelTransactionType::Debit => TransactionType::Debit,
            ModelTransactionType::Credit => TransactionType::Credit,
            ModelTransactionType::Unknown => TransactionType::Unknown,
        }
    }
}

/// Structured transaction the model must return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelTransaction {
    /// Reference number printed in the message (UPI ref, UTR, transaction id)
    pub transaction_id: Option<String>,
    /// Amount as a plain non-negative number, no currency symbol
    pub amount: f64,
    /// Who was paid, or who paid the account holder
    pub merchant: Option<String>,
    /// Direction from the account holder's point of view
    #[serde(rename = "type")]
    pub transaction_type: ModelTransactionType,
    /// One of the allowed category names
    pub category: Option<String>,
    /// Transaction date, YYYY-MM-DD
    pub date: Option<String>,
    /// ISO 4217 code of the amount
    pub currency: Option<String>,
    /// Last four digits of the card or account, or "UPI"
    pub account_last_digits: Option<String>,
    /// Self-assessed confidence between 0 and 1
    pub confidence: Option<f64>,
}

impl ModelTransaction {
    /// Validates a structuring response; anything off-schema is rejected
    pub fn from_response(text: &str) -> Result<Self, ExtractionError> {
        let cleaned = strip_code_fences(text);
        let value: Value = serde_json::from_str(cleaned)
            .map_err(|e| ExtractionError::Schema(format!("invalid JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| ExtractionError::Schema("expected a JSON object".to_string()))?;

        let amount = match object.get("amount") {
            None | Some(Value::Null) => {
                return Err(ExtractionError::Schema("amount is missing".to_string()))
            }
            Some(raw) => lenient_number(raw)
                .ok_or_else(|| ExtractionError::Schema(format!("amount is not numeric: {}", raw)))?,
        };
        if !amount.is_finite() || amount < 0.0 {
            return Err(ExtractionError::Schema(format!(
                "amount out of range: {}",
                amount
            )));
        }

        let transaction_type = match optional_string(object, "type") {
            Some(raw) => parse_model_type(&raw)
                .ok_or_else(|| ExtractionError::Schema(format!("unknown type: {}", raw)))?,
            None => return Err(ExtractionError::Schema("type is missing".to_string())),
        };

        let confidence = match object.get("confidence") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => {
                let c = n.as_f64().unwrap_or(f64::NAN);
                if !(0.0..=1.0).contains(&c) {
                    return Err(ExtractionError::Schema(format!(
                        "confidence out of range: {}",
                        c
                    )));
                }
                Some(c)
            }
            Some(other) => {
                return Err(ExtractionError::Schema(format!(
                    "confidence is not a number: {}",
                    other
                )))
            }
        };

        let account_last_digits = match optional_string(object, "account_last_digits") {
            Some(raw) => Some(validate_account_digits(&raw).ok_or_else(|| {
                ExtractionError::Schema(format!("invalid account_last_digits: {}", raw))
            })?),
            None => None,
        };

        Ok(Self {
            transaction_id: optional_string(object, "transaction_id"),
            amount,
            merchant: optional_string(object, "merchant"),
            transaction_type,
            category: optional_string(object, "category"),
            date: optional_string(object, "date"),
            currency: optional_string(object, "currency").map(|c| c.to_ascii_uppercase()),
            account_last_digits,
            confidence,
        })
    }
}

fn parse_model_type(raw: &str) -> Option<ModelTransactionType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "debit" => Some(ModelTransactionType::Debit),
        "credit" => Some(ModelTransactionType::Credit),
        "unknown" => Some(ModelTransactionType::Unknown),
        _ => None,
    }
}

fn validate_account_digits(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(UPI_ACCOUNT_SUFFIX) {
        return Some(UPI_ACCOUNT_SUFFIX.to_string());
    }
    (trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()))
        .then(|| trimmed.to_string())
}

/// Non-empty trimmed string; JSON null, "" and "null" count as absent
pub(crate) fn optional_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    let value = match object.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(value)
    }
}

/// Numbers, or strings like "₹1,400.00" and "USD 20"
pub(crate) fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let number = number_regex().find(s)?;
            number.as_str().replace(',', "").parse::<f64>().ok()
        }
        _ => None,
    }
}

fn number_regex() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").unwrap())
}

/// Drops a surrounding Markdown code fence, with or without a language tag
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_response_in_fence() {
        let text = "```json\n{\"transaction_id\": \"512345678901\", \"amount\": \"₹1,400.00\", \"merchant\": \"Zomato\", \"type\": \"DEBIT\", \"category\": \"Food & Dining\", \"date\": \"2025-09-25\", \"currency\": \"inr\", \"account_last_digits\": \"2008\", \"confidence\": 0.92}\n```";
        let parsed = ModelTransaction::from_response(text).unwrap();

        assert_eq!(parsed.amount, 1400.0);
        assert_eq!(parsed.transaction_type, ModelTransactionType::Debit);
        assert_eq!(parsed.currency.as_deref(), Some("INR"));
        assert_eq!(parsed.account_last_digits.as_deref(), Some("2008"));
        assert_eq!(parsed.confidence, Some(0.92));
    }

    #[test]
    fn test_missing_amount_is_rejected() {
        let err = ModelTransaction::from_response(r#"{"type": "debit"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Schema(_)));
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        assert!(ModelTransaction::from_response(r#"{"amount": -5, "type": "debit"}"#).is_err());
    }

    #[test]
    fn test_bad_type_and_confidence_are_rejected() {
        assert!(ModelTransaction::from_response(r#"{"amount": 5, "type": "transfer"}"#).is_err());
        assert!(ModelTransaction::from_response(
            r#"{"amount": 5, "type": "credit", "confidence": 1.5}"#
        )
        .is_err());
    }

    #[test]
    fn test_account_digits_rules() {
        let upi = ModelTransaction::from_response(
            r#"{"amount": 5, "type": "debit", "account_last_digits": "upi"}"#,
        )
        .unwrap();
        assert_eq!(upi.account_last_digits.as_deref(), Some(UPI_ACCOUNT_SUFFIX));

        assert!(ModelTransaction::from_response(
            r#"{"amount": 5, "type": "debit", "account_last_digits": "XX20"}"#
        )
        .is_err());

        let absent = ModelTransaction::from_response(
            r#"{"amount": 5, "type": "debit", "account_last_digits": null, "merchant": ""}"#,
        )
        .unwrap();
        assert_eq!(absent.account_last_digits, None);
        assert_eq!(absent.merchant, None);
    }

    #[test]
    fn test_prose_is_rejected() {
        assert!(ModelTransaction::from_response("I could not find a transaction.").is_err());
        assert!(ModelTransaction::from_response("[1, 2]").is_err());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_lenient_number() {
        assert_eq!(lenient_number(&Value::from("Rs. 1,400.50")), Some(1400.5));
        assert_eq!(lenient_number(&Value::from("USD 20")), Some(20.0));
        assert_eq!(lenient_number(&Value::from(12.5)), Some(12.5));
        assert_eq!(lenient_number(&Value::from("n/a")), None);
    }
}
