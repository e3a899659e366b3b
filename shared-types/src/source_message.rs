use crate::transaction::ExtractionMethod;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Where a raw message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Sms,
    Email,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "email" => Self::Email,
            _ => Self::Sms,
        }
    }
}

/// Raw notification waiting to be (or already) turned into a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SourceMessage {
    pub id: i64,
    pub source_kind: SourceKind,
    /// Stable id in the originating system (SMS row id, Message-ID header)
    pub source_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    pub received_at: i64,
    pub processed_at: Option<i64>,
    pub attempts: i64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct NewSourceMessage {
    pub source_kind: SourceKind,
    pub source_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    pub received_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateSourceMessagesRequest {
    pub messages: Vec<NewSourceMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EnqueueMessagesResponse {
    pub queued: usize,
    /// Already known by `(source_kind, source_id)`
    pub skipped: usize,
}

/// One pipeline run over one input, kept for auditing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExtractionAttempt {
    pub id: i64,
    pub source_message_id: Option<i64>,
    pub method: ExtractionMethod,
    pub success: bool,
    pub confidence: f64,
    pub elapsed_ms: i64,
    pub error: Option<String>,
    pub transaction_id: Option<String>,
    pub duplicate: bool,
    pub attempted_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExtractionAttemptsResponse {
    pub attempts: Vec<ExtractionAttempt>,
}

/// Outcome of one batch sync run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncReport {
    pub scanned: i64,
    pub inserted: i64,
    pub duplicates: i64,
    pub failed: i64,
    pub remaining: i64,
    pub stopped_early: bool,
}
