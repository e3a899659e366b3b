//! Reader for SMS backup CSV exports.
//!
//! Expected header: `address,body,date` with an optional `id` (or `_id`)
//! column. `date` is epoch milliseconds as written by Android backup apps,
//! or an RFC 3339 timestamp.

use chrono::DateTime;
use csv::ReaderBuilder;
use serde::Deserialize;
use shared_types::{NewSourceMessage, SourceKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmsExportError {
    #[error("Failed to read SMS export: {0}")]
    Csv(#[from] csv::Error),

    #[error("SMS export is missing the '{0}' column")]
    MissingColumn(&'static str),
}

#[derive(Debug, Deserialize)]
struct SmsRow {
    address: String,
    body: String,
    date: String,
    #[serde(default, alias = "_id")]
    id: Option<String>,
}

pub struct SmsExportParser {
    delimiter: u8,
}

impl SmsExportParser {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Messages in file order; rows that fail to decode are skipped
    pub fn parse(&self, content: &[u8]) -> Result<Vec<NewSourceMessage>, SmsExportError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(content);

        let headers = reader.headers()?.clone();
        for required in ["address", "body", "date"] {
            if !headers.iter().any(|h| h.trim() == required) {
                return Err(SmsExportError::MissingColumn(required));
            }
        }

        let mut messages = Vec::new();
        for (line, result) in reader.deserialize::<SmsRow>().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping SMS export row {}: {}", line + 1, e);
                    continue;
                }
            };

            if row.body.trim().is_empty() {
                continue;
            }

            let Some(received_at) = parse_received_at(&row.date) else {
                tracing::warn!("Skipping SMS export row {}: bad date '{}'", line + 1, row.date);
                continue;
            };

            let source_id = match row.id.filter(|id| !id.trim().is_empty()) {
                Some(id) => format!("sms:{}", id.trim()),
                None => format!("sms:{}:{}", row.address.trim(), received_at),
            };

            messages.push(NewSourceMessage {
                source_kind: SourceKind::Sms,
                source_id,
                sender: Some(row.address.trim().to_string()).filter(|s| !s.is_empty()),
                subject: None,
                body: row.body,
                received_at,
            });
        }

        Ok(messages)
    }
}

impl Default for SmsExportParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Unix seconds from epoch millis, epoch seconds, or RFC 3339
fn parse_received_at(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        // 13-digit values are milliseconds
        return Some(if value > 99_999_999_999 { value / 1000 } else { value });
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.timestamp())
}
