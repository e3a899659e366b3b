use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::{params, Row};
use shared_types::{NewSourceMessage, SourceKind, SourceMessage};

const SELECT_COLUMNS: &str = "SELECT id, source_kind, source_id, sender, subject, body,
        received_at, processed_at, attempts, last_error
     FROM source_messages";

fn message_from_row(row: &Row) -> rusqlite::Result<SourceMessage> {
    let kind: String = row.get(1)?;
    Ok(SourceMessage {
        id: row.get(0)?,
        source_kind: SourceKind::parse(&kind),
        source_id: row.get(2)?,
        sender: row.get(3)?,
        subject: row.get(4)?,
        body: row.get(5)?,
        received_at: row.get(6)?,
        processed_at: row.get(7)?,
        attempts: row.get(8)?,
        last_error: row.get(9)?,
    })
}

/// Queues messages, ignoring ones already known by `(source_kind, source_id)`.
/// Returns how many were new.
pub async fn insert_messages(
    conn: AsyncDbConnection,
    messages: &[NewSourceMessage],
) -> Result<usize> {
    let mut conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();

    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO source_messages
             (source_kind, source_id, sender, subject, body, received_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for message in messages {
            inserted += stmt.execute(params![
                message.source_kind.as_str(),
                message.source_id,
                message.sender,
                message.subject,
                message.body,
                message.received_at,
                now,
            ])?;
        }
    }
    tx.commit()?;

    Ok(inserted)
}

pub async fn get_message(conn: AsyncDbConnection, id: i64) -> Result<Option<SourceMessage>> {
    let conn = conn.lock().await?;
    let mut stmt = conn.prepare(&format!("{} WHERE id = ?", SELECT_COLUMNS))?;
    let mut rows = stmt.query_map([id], message_from_row)?;
    Ok(rows.next().transpose()?)
}

/// Unprocessed messages below the attempt cap, oldest first
pub async fn list_pending(
    conn: AsyncDbConnection,
    max_attempts: i64,
    limit: usize,
) -> Result<Vec<SourceMessage>> {
    let conn = conn.lock().await?;

    let mut stmt = conn.prepare(&format!(
        "{} WHERE processed_at IS NULL AND attempts < ?
         ORDER BY received_at ASC, id ASC
         LIMIT ?",
        SELECT_COLUMNS
    ))?;

    let rows = stmt.query_map(params![max_attempts, limit as i64], message_from_row)?;

    let mut messages = Vec::new();
    for row_result in rows {
        messages.push(row_result?);
    }

    Ok(messages)
}

pub async fn count_pending(conn: AsyncDbConnection, max_attempts: i64) -> Result<i64> {
    let conn = conn.lock().await?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM source_messages WHERE processed_at IS NULL AND attempts < ?",
        [max_attempts],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub async fn mark_processed(conn: AsyncDbConnection, id: i64, processed_at: i64) -> Result<()> {
    let conn = conn.lock().await?;
    conn.execute(
        "UPDATE source_messages
         SET processed_at = ?, attempts = attempts + 1, last_error = NULL
         WHERE id = ?",
        params![processed_at, id],
    )?;
    Ok(())
}

/// Leaves the message pending for the next run
pub async fn record_failure(conn: AsyncDbConnection, id: i64, error: &str) -> Result<()> {
    let conn = conn.lock().await?;
    conn.execute(
        "UPDATE source_messages SET attempts = attempts + 1, last_error = ? WHERE id = ?",
        params![error, id],
    )?;
    Ok(())
}
