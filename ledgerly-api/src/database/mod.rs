pub mod extraction_attempts;
pub mod migrations;
pub mod source_messages;

use ledgerly_agents::storage::SqliteLedgerStorage;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type DbConnection = Arc<Mutex<Connection>>;

#[derive(Clone)]
pub struct AsyncDbConnection {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl AsyncDbConnection {
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn lock(&self) -> anyhow::Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get DB connection from pool: {}", e))
    }
}

pub struct Database {
    pub connection: DbConnection,
    pub async_connection: AsyncDbConnection,
    /// Transaction, recurring, rate and category tables over `connection`
    pub ledger: Arc<SqliteLedgerStorage>,
}

impl Database {
    /// Opens the file, runs migrations, then builds the pool
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let sync_conn = Connection::open(db_path)?;
        sync_conn.busy_timeout(Duration::from_secs(5))?;
        migrations::run_migrations(&sync_conn)?;
        let sync_mutex = Arc::new(Mutex::new(sync_conn));

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        Ok(Database {
            ledger: Arc::new(SqliteLedgerStorage::new(sync_mutex.clone())),
            connection: sync_mutex,
            async_connection: AsyncDbConnection::new(pool),
        })
    }

    pub fn ping(&self) -> anyhow::Result<()> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
