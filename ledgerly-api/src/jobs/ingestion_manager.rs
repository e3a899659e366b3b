use crate::database::extraction_attempts::{self as attempts_db, NewAttempt};
use crate::database::source_messages as messages_db;
use crate::database::AsyncDbConnection;
use ledgerly_agents::dedup::{DeduplicationEngine, InsertOutcome};
use ledgerly_agents::transaction_extractor::HybridExtractionPipeline;
use shared_types::{SourceMessage, SyncReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Messages taken per run
    pub batch_size: usize,
    /// Pause between messages, for model quotas
    pub item_delay: Duration,
    pub wall_clock_budget: Duration,
    /// Messages that failed this often stop being picked up
    pub max_attempts: i64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            item_delay: Duration::from_millis(1000),
            wall_clock_budget: Duration::from_secs(25),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Sync already running")]
    SyncAlreadyRunning,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

enum ItemOutcome {
    Inserted,
    Duplicate,
    Skipped,
}

/// Clears the running flag however the sync ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct IngestionManager {
    db_conn: AsyncDbConnection,
    pipeline: Arc<HybridExtractionPipeline>,
    dedup: Arc<DeduplicationEngine>,
    config: IngestionConfig,
    running: AtomicBool,
}

impl IngestionManager {
    pub fn new(
        db_conn: AsyncDbConnection,
        pipeline: Arc<HybridExtractionPipeline>,
        dedup: Arc<DeduplicationEngine>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            db_conn,
            pipeline,
            dedup,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Works through pending messages, oldest first, within the batch and time limits.
    /// Whatever is left stays pending for the next call.
    pub async fn sync_pending(&self) -> Result<SyncReport, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SyncAlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let started = Instant::now();
        let pending = messages_db::list_pending(
            self.db_conn.clone(),
            self.config.max_attempts,
            self.config.batch_size,
        )
        .await?;

        tracing::info!("Sync started with {} pending messages", pending.len());

        let mut report = SyncReport::default();
        for (idx, message) in pending.iter().enumerate() {
            let pause = if idx > 0 {
                self.config.item_delay
            } else {
                Duration::ZERO
            };
            if started.elapsed() + pause >= self.config.wall_clock_budget {
                tracing::warn!(
                    "Sync budget of {:?} reached after {} messages",
                    self.config.wall_clock_budget,
                    report.scanned
                );
                report.stopped_early = true;
                break;
            }
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            report.scanned += 1;
            match self.process_message(message).await {
                Ok(ItemOutcome::Inserted) => report.inserted += 1,
                Ok(ItemOutcome::Duplicate) => report.duplicates += 1,
                Ok(ItemOutcome::Skipped) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Failed to ingest message {}: {}", message.id, e);
                    if let Err(e) =
                        messages_db::record_failure(self.db_conn.clone(), message.id, &e.to_string())
                            .await
                    {
                        tracing::error!("Failed to record failure for message {}: {}", message.id, e);
                    }
                }
            }
        }

        report.remaining =
            messages_db::count_pending(self.db_conn.clone(), self.config.max_attempts).await?;

        tracing::info!(
            "Sync finished in {}ms: scanned {}, inserted {}, duplicates {}, failed {}, remaining {}",
            started.elapsed().as_millis(),
            report.scanned,
            report.inserted,
            report.duplicates,
            report.failed,
            report.remaining
        );
        Ok(report)
    }

    async fn process_message(&self, message: &SourceMessage) -> anyhow::Result<ItemOutcome> {
        if self.pipeline.preprocessor().is_one_time_code(&message.body) {
            tracing::debug!("Message {} is a one-time code, skipping", message.id);
            messages_db::mark_processed(
                self.db_conn.clone(),
                message.id,
                chrono::Utc::now().timestamp(),
            )
            .await?;
            return Ok(ItemOutcome::Skipped);
        }

        let parsing = self
            .pipeline
            .extract_message(message.subject.as_deref(), &message.body)
            .await;

        let Some(mut transaction) = parsing.transaction.clone() else {
            let error = parsing
                .error
                .clone()
                .unwrap_or_else(|| "extraction produced no transaction".to_string());
            attempts_db::insert_attempt(
                self.db_conn.clone(),
                &NewAttempt {
                    source_message_id: Some(message.id),
                    method: parsing.method,
                    success: false,
                    confidence: parsing.confidence,
                    elapsed_ms: parsing.elapsed_ms,
                    error: Some(&error),
                    transaction_id: None,
                    duplicate: false,
                },
            )
            .await?;
            anyhow::bail!(error);
        };

        transaction.source_id = Some(format!(
            "{}:{}",
            message.source_kind.as_str(),
            message.source_id
        ));
        if !parsing.event_date_found {
            transaction.occurred_at = message.received_at;
        }

        let outcome = self.dedup.insert(transaction).await?;

        attempts_db::insert_attempt(
            self.db_conn.clone(),
            &NewAttempt {
                source_message_id: Some(message.id),
                method: parsing.method,
                success: parsing.success,
                confidence: parsing.confidence,
                elapsed_ms: parsing.elapsed_ms,
                error: parsing.error.as_deref(),
                transaction_id: Some(&outcome.transaction().id),
                duplicate: outcome.is_duplicate(),
            },
        )
        .await?;

        messages_db::mark_processed(
            self.db_conn.clone(),
            message.id,
            chrono::Utc::now().timestamp(),
        )
        .await?;

        Ok(match outcome {
            InsertOutcome::Inserted(_) => ItemOutcome::Inserted,
            InsertOutcome::Duplicate { .. } => ItemOutcome::Duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use async_trait::async_trait;
    use ledgerly_agents::currency::{CurrencyRateCache, RateCacheConfig, RateError, RateSource};
    use ledgerly_agents::transaction_extractor::PipelineConfig;
    use ledgerly_agents::TransactionStore;
    use shared_types::{NewSourceMessage, SourceKind, TransactionFilter};
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct Offline;

    #[async_trait]
    impl RateSource for Offline {
        async fn fetch_rates(&self, _base: &str) -> Result<HashMap<String, f64>, RateError> {
            Err(RateError::Api("offline".to_string()))
        }
    }

    // 2025-09-25T10:00:00Z
    const RECEIVED: i64 = 1758794400;

    fn setup(config: IngestionConfig) -> (TempDir, Arc<Database>, IngestionManager) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("db.sqlite")).unwrap());

        let rates = Arc::new(CurrencyRateCache::new(
            RateCacheConfig::default(),
            db.ledger.clone(),
            Arc::new(Offline),
        ));
        let pipeline = Arc::new(HybridExtractionPipeline::new(
            PipelineConfig::deterministic_only(),
            None,
            rates,
            db.ledger.clone(),
        ));
        let dedup = Arc::new(DeduplicationEngine::new(db.ledger.clone()));
        let manager =
            IngestionManager::new(db.async_connection.clone(), pipeline, dedup, config);
        (dir, db, manager)
    }

    fn fast() -> IngestionConfig {
        IngestionConfig {
            item_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn sms(id: &str, body: &str, offset: i64) -> NewSourceMessage {
        NewSourceMessage {
            source_kind: SourceKind::Sms,
            source_id: id.to_string(),
            sender: Some("AX-ICICIB".to_string()),
            subject: None,
            body: body.to_string(),
            received_at: RECEIVED + offset,
        }
    }

    async fn enqueue(db: &Database, messages: &[NewSourceMessage]) -> usize {
        messages_db::insert_messages(db.async_connection.clone(), messages)
            .await
            .unwrap()
    }

    async fn stored(db: &Database) -> usize {
        db.ledger
            .filter_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_sync_inserts_dedups_and_skips_codes() {
        let (_dir, db, manager) = setup(fast());
        let zomato = "Rs 1,400.00 spent using ICICI Bank Card XX2008 on 25-Sep-25 at ZOMATO.";
        let queued = enqueue(
            &db,
            &[
                sms("1", zomato, 0),
                sms("2", zomato, 10),
                sms("3", "123456 is your OTP for txn of Rs 500.00. Do not share.", 20),
                sms("4", "Rs 5,000.00 credited to your A/C XX1234 from Employer on 01-Jan-25. Salary payment.", 30),
            ],
        )
        .await;
        assert_eq!(queued, 4);
        assert_eq!(enqueue(&db, &[sms("1", zomato, 0)]).await, 0);

        let report = manager.sync_pending().await.unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.remaining, 0);
        assert!(!report.stopped_early);
        assert_eq!(stored(&db).await, 2);

        let attempts = attempts_db::list_attempts(db.async_connection.clone(), 10)
            .await
            .unwrap();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts.iter().filter(|a| a.duplicate).count(), 1);

        let again = manager.sync_pending().await.unwrap();
        assert_eq!(again.scanned, 0);
    }

    #[tokio::test]
    async fn test_source_id_and_received_time_are_carried() {
        let (_dir, db, manager) = setup(fast());
        enqueue(
            &db,
            &[
                sms("42", "Rs 250 debited from A/C XX1234 at Swiggy", 0),
                sms("43", "Rs 1,400.00 spent using ICICI Bank Card XX2008 on 25-Sep-25 at ZOMATO.", 5),
            ],
        )
        .await;

        manager.sync_pending().await.unwrap();
        let txns = db
            .ledger
            .filter_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(txns.len(), 2);
        // newest first: the undated message takes its received time
        assert_eq!(txns[0].source_id.as_deref(), Some("sms:42"));
        assert_eq!(txns[0].occurred_at, RECEIVED);
        assert_eq!(txns[1].source_id.as_deref(), Some("sms:43"));
        assert_eq!(txns[1].occurred_at, 1_758_758_400);
    }

    #[tokio::test]
    async fn test_batch_cap_leaves_remainder_pending() {
        let (_dir, db, manager) = setup(IngestionConfig {
            batch_size: 2,
            ..fast()
        });
        enqueue(
            &db,
            &[
                sms("a", "Rs 100 debited from A/C XX1234 at Uber", 0),
                sms("b", "Rs 200 debited from A/C XX1234 at Ola", 1),
                sms("c", "Rs 300 debited from A/C XX1234 at Rapido", 2),
            ],
        )
        .await;

        let first = manager.sync_pending().await.unwrap();
        assert_eq!(first.scanned, 2);
        assert_eq!(first.remaining, 1);

        let second = manager.sync_pending().await.unwrap();
        assert_eq!(second.scanned, 1);
        assert_eq!(second.remaining, 0);
    }

    #[tokio::test]
    async fn test_exhausted_budget_stops_early() {
        let (_dir, db, manager) = setup(IngestionConfig {
            wall_clock_budget: Duration::ZERO,
            ..fast()
        });
        enqueue(&db, &[sms("a", "Rs 100 debited from A/C XX1234 at Uber", 0)]).await;

        let report = manager.sync_pending().await.unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.scanned, 0);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_second_sync_is_rejected_while_running() {
        let (_dir, db, manager) = setup(IngestionConfig {
            item_delay: Duration::from_millis(200),
            ..Default::default()
        });
        enqueue(
            &db,
            &[
                sms("a", "Rs 100 debited from A/C XX1234 at Uber", 0),
                sms("b", "Rs 200 debited from A/C XX1234 at Ola", 1),
            ],
        )
        .await;

        let (first, second) = tokio::join!(manager.sync_pending(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            manager.sync_pending().await
        });

        assert_eq!(first.unwrap().scanned, 2);
        assert!(matches!(second, Err(SyncError::SyncAlreadyRunning)));
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_message_pending_and_continues() {
        let (_dir, db, manager) = setup(fast());
        enqueue(
            &db,
            &[
                sms("a", "Rs 100 debited from A/C XX1234 at Uber", 0),
                sms("b", "Rs 200 debited from A/C XX1234 at Ola", 1),
            ],
        )
        .await;
        db.connection
            .lock()
            .unwrap()
            .execute("DROP TABLE transactions", [])
            .unwrap();

        let report = manager.sync_pending().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.remaining, 2);

        let pending = messages_db::list_pending(db.async_connection.clone(), 3, 10)
            .await
            .unwrap();
        assert!(pending.iter().all(|m| m.attempts == 1 && m.last_error.is_some()));
    }
}
