use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::params;
use shared_types::{ExtractionAttempt, ExtractionMethod};

pub struct NewAttempt<'a> {
    pub source_message_id: Option<i64>,
    pub method: ExtractionMethod,
    pub success: bool,
    pub confidence: f64,
    pub elapsed_ms: i64,
    pub error: Option<&'a str>,
    pub transaction_id: Option<&'a str>,
    pub duplicate: bool,
}

pub async fn insert_attempt(conn: AsyncDbConnection, attempt: &NewAttempt<'_>) -> Result<i64> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();

    let id: i64 = conn.query_row(
        "INSERT INTO extraction_attempts
         (source_message_id, method, success, confidence, elapsed_ms, error, transaction_id,
          duplicate, attempted_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
        params![
            attempt.source_message_id,
            attempt.method.as_str(),
            attempt.success,
            attempt.confidence,
            attempt.elapsed_ms,
            attempt.error,
            attempt.transaction_id,
            attempt.duplicate,
            now,
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn list_attempts(conn: AsyncDbConnection, limit: usize) -> Result<Vec<ExtractionAttempt>> {
    let conn = conn.lock().await?;

    let mut stmt = conn.prepare(
        "SELECT id, source_message_id, method, success, confidence, elapsed_ms, error,
                transaction_id, duplicate, attempted_at
         FROM extraction_attempts
         ORDER BY attempted_at DESC, id DESC
         LIMIT ?",
    )?;

    let rows = stmt.query_map([limit as i64], |row| {
        let method: String = row.get(2)?;
        Ok(ExtractionAttempt {
            id: row.get(0)?,
            source_message_id: row.get(1)?,
            method: ExtractionMethod::parse(&method).unwrap_or(ExtractionMethod::Deterministic),
            success: row.get(3)?,
            confidence: row.get(4)?,
            elapsed_ms: row.get(5)?,
            error: row.get(6)?,
            transaction_id: row.get(7)?,
            duplicate: row.get(8)?,
            attempted_at: row.get(9)?,
        })
    })?;

    let mut attempts = Vec::new();
    for row_result in rows {
        attempts.push(row_result?);
    }

    Ok(attempts)
}
