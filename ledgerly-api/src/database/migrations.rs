use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    ledgerly_agents::storage::initialize_schema(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS source_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_kind TEXT NOT NULL CHECK (source_kind IN ('sms', 'email')),
            source_id TEXT NOT NULL,
            sender TEXT,
            subject TEXT,
            body TEXT NOT NULL,
            received_at INTEGER NOT NULL,
            processed_at INTEGER,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE(source_kind, source_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS extraction_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_message_id INTEGER,
            method TEXT NOT NULL,
            success INTEGER NOT NULL,
            confidence REAL NOT NULL,
            elapsed_ms INTEGER NOT NULL,
            error TEXT,
            transaction_id TEXT,
            duplicate INTEGER NOT NULL DEFAULT 0,
            attempted_at INTEGER NOT NULL,
            FOREIGN KEY (source_message_id) REFERENCES source_messages (id) ON DELETE SET NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_source_messages_pending
            ON source_messages(processed_at, received_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_extraction_attempts_attempted_at
            ON extraction_attempts(attempted_at)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('transactions', 'source_messages', 'extraction_attempts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
