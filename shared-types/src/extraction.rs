use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Why the primary (model-based) path did not produce a transaction.
///
/// None of these escape the extraction pipeline: each one is turned into a
/// deterministic fallback and recorded on the resulting `ParsingResult`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Primary extraction disabled by configuration")]
    Disabled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractionError {
    /// Transport-class failures (network, deadline, HTTP status)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Status { .. }
        )
    }
}

/// Fields the deterministic cascade looks for; drives the confidence heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractedField {
    Type,
    Amount,
    Merchant,
    TransactionRef,
    Date,
    Account,
}

impl ExtractedField {
    pub const ALL: [ExtractedField; 6] = [
        Self::Type,
        Self::Amount,
        Self::Merchant,
        Self::TransactionRef,
        Self::Date,
        Self::Account,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Amount => "amount",
            Self::Merchant => "merchant",
            Self::TransactionRef => "transaction_ref",
            Self::Date => "date",
            Self::Account => "account",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(ExtractionError::Timeout(20_000).is_transport());
        assert!(ExtractionError::Status {
            status: 503,
            body: "overloaded".to_string()
        }
        .is_transport());
        assert!(!ExtractionError::Schema("missing amount".to_string()).is_transport());
        assert!(!ExtractionError::Disabled.is_transport());
    }

    #[test]
    fn test_error_messages() {
        let err = ExtractionError::Schema("amount is negative".to_string());
        assert_eq!(err.to_string(), "Schema error: amount is negative");
        assert_eq!(
            ExtractionError::Timeout(15_000).to_string(),
            "Request timed out after 15000ms"
        );
    }

    #[test]
    fn test_extracted_field_serialization() {
        let json = serde_json::to_string(&ExtractedField::TransactionRef).unwrap();
        assert_eq!(json, "\"transaction-ref\"");
        assert_eq!(ExtractedField::ALL.len(), 6);
    }
}
