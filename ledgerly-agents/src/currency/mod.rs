//! Currency Rate Cache
//!
//! `rate(code)` answers "how many base-currency units is one unit of
//! `code`". Live rates are stored as "1 base = X foreign" (the shape rate
//! APIs return) and inverted on read. Lookup order: base currency, fresh
//! cache, live refresh, static table, and finally 1.0 with a warning.

pub mod open_er_api;

pub use open_er_api::OpenErApiSource;

use crate::storage::RateStore;
use async_trait::async_trait;
use shared_types::{ExchangeRateCacheEntry, ExchangeRatesResponse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Approximate INR value of one unit of each currency
const STATIC_INR_RATES: &[(&str, f64)] = &[
    ("INR", 1.0),
    ("USD", 83.0),
    ("EUR", 90.0),
    ("GBP", 105.0),
    ("AED", 22.6),
    ("SGD", 61.5),
    ("JPY", 0.56),
    ("AUD", 55.0),
    ("CAD", 61.0),
    ("CHF", 94.0),
    ("CNY", 11.5),
    ("SAR", 22.1),
    ("HKD", 10.6),
    ("THB", 2.3),
    ("MYR", 17.6),
];

#[derive(Debug, Error)]
pub enum RateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate API returned status {0}")]
    Status(u16),

    #[error("Rate API error: {0}")]
    Api(String),

    #[error("Refresh suppressed after a recent failure")]
    Backoff,
}

/// Live rate table provider: returns "1 `base` = X code" for every code
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, base_currency: &str) -> Result<HashMap<String, f64>, RateError>;
}

#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    pub base_currency: String,
    pub ttl: Duration,
    /// Minimum wait between live refresh attempts after a failure
    pub failure_backoff: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            base_currency: "INR".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
            failure_backoff: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
struct RateTable {
    /// 1 base = rate foreign
    rates: HashMap<String, f64>,
    updated_at: i64,
}

impl RateTable {
    fn from_entries(entries: Vec<ExchangeRateCacheEntry>) -> Option<Self> {
        let updated_at = entries.iter().map(|e| e.updated_at).min()?;
        let rates = entries
            .into_iter()
            .map(|e| (e.currency_code, e.rate))
            .collect();
        Some(Self { rates, updated_at })
    }

    fn is_fresh(&self, ttl: Duration, now: i64) -> bool {
        now - self.updated_at < ttl.as_secs() as i64
    }

    /// Base units per one unit of `code`
    fn base_per_unit(&self, code: &str) -> Option<f64> {
        let per_base = *self.rates.get(code)?;
        (per_base.is_finite() && per_base > 0.0).then(|| 1.0 / per_base)
    }
}

pub struct CurrencyRateCache {
    config: RateCacheConfig,
    store: Arc<dyn RateStore>,
    source: Arc<dyn RateSource>,
    memory: RwLock<Option<RateTable>>,
    last_failure: Mutex<Option<Instant>>,
}

impl CurrencyRateCache {
    pub fn new(
        config: RateCacheConfig,
        store: Arc<dyn RateStore>,
        source: Arc<dyn RateSource>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            memory: RwLock::new(None),
            last_failure: Mutex::new(None),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.config.base_currency
    }

    pub fn is_base(&self, code: &str) -> bool {
        code.trim().eq_ignore_ascii_case(&self.config.base_currency)
    }

    /// Base-currency value of one unit of `code`
    pub async fn rate(&self, code: &str) -> f64 {
        let code = code.trim().to_ascii_uppercase();
        if self.is_base(&code) {
            return 1.0;
        }

        if let Some(table) = self.current_table().await {
            if let Some(rate) = table.base_per_unit(&code) {
                return rate;
            }
        }

        if let Some(rate) = static_rate(&code, &self.config.base_currency) {
            tracing::debug!("Using static rate for {}: {}", code, rate);
            return rate;
        }

        tracing::warn!(
            "No exchange rate for {}; treating amount as {}",
            code,
            self.config.base_currency
        );
        1.0
    }

    pub async fn convert(&self, amount: f64, code: &str) -> f64 {
        amount * self.rate(code).await
    }

    /// Fresh table from memory or the store, refreshing when stale or absent
    async fn current_table(&self) -> Option<RateTable> {
        let now = chrono::Utc::now().timestamp();

        if let Some(table) = self.memory.read().await.as_ref() {
            if table.is_fresh(self.config.ttl, now) {
                return Some(table.clone());
            }
        }

        match self.store.load_rates().await {
            Ok(entries) => {
                if let Some(table) = RateTable::from_entries(entries) {
                    if table.is_fresh(self.config.ttl, now) {
                        *self.memory.write().await = Some(table.clone());
                        return Some(table);
                    }
                }
            }
            Err(e) => tracing::error!("Failed to load cached exchange rates: {}", e),
        }

        match self.refresh().await {
            Ok(_) => self.memory.read().await.clone(),
            Err(RateError::Backoff) => None,
            Err(e) => {
                tracing::warn!("Exchange rate refresh failed, using static rates: {}", e);
                None
            }
        }
    }

    /// Fetches a live table and stores it wholesale; returns the number of rates
    pub async fn refresh(&self) -> Result<usize, RateError> {
        if self.in_backoff() {
            return Err(RateError::Backoff);
        }

        let fetched = match self.source.fetch_rates(&self.config.base_currency).await {
            Ok(rates) => rates,
            Err(e) => {
                self.note_failure();
                return Err(e);
            }
        };

        let now = chrono::Utc::now().timestamp();
        let entries: Vec<ExchangeRateCacheEntry> = fetched
            .into_iter()
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .map(|(code, rate)| ExchangeRateCacheEntry {
                currency_code: code.to_ascii_uppercase(),
                rate,
                updated_at: now,
            })
            .collect();

        if entries.is_empty() {
            self.note_failure();
            return Err(RateError::Api("empty rate table".to_string()));
        }

        if let Err(e) = self.store.replace_rates(&entries).await {
            tracing::error!("Failed to persist exchange rates: {}", e);
        }

        let count = entries.len();
        *self.memory.write().await = RateTable::from_entries(entries);
        tracing::info!(
            "Refreshed {} exchange rates for base {}",
            count,
            self.config.base_currency
        );
        Ok(count)
    }

    /// Forced refresh that ignores the failure backoff
    pub async fn force_refresh(&self) -> Result<usize, RateError> {
        if let Ok(mut last) = self.last_failure.lock() {
            *last = None;
        }
        self.refresh().await
    }

    /// Stored table as served by the API
    pub async fn snapshot(&self) -> anyhow::Result<ExchangeRatesResponse> {
        let rates = self.store.load_rates().await?;
        let now = chrono::Utc::now().timestamp();
        let is_fresh = RateTable::from_entries(rates.clone())
            .map(|t| t.is_fresh(self.config.ttl, now))
            .unwrap_or(false);

        Ok(ExchangeRatesResponse {
            base_currency: self.config.base_currency.clone(),
            rates,
            is_fresh,
        })
    }

    fn in_backoff(&self) -> bool {
        self.last_failure
            .lock()
            .map(|last| {
                last.map(|at| at.elapsed() < self.config.failure_backoff)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn note_failure(&self) {
        if let Ok(mut last) = self.last_failure.lock() {
            *last = Some(Instant::now());
        }
    }
}

/// Static INR table, crossed through INR for other base currencies
pub fn static_rate(code: &str, base_currency: &str) -> Option<f64> {
    let lookup = |c: &str| {
        STATIC_INR_RATES
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(c))
            .map(|(_, v)| *v)
    };
    let code_in_inr = lookup(code)?;
    let base_in_inr = lookup(base_currency)?;
    Some(code_in_inr / base_in_inr)
}

pub fn static_currency_codes() -> impl Iterator<Item = &'static str> {
    STATIC_INR_RATES.iter().map(|(code, _)| *code)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rate source returning a fixed table, or failing when `None`
    pub struct FixedRates {
        pub rates: Option<HashMap<String, f64>>,
        pub calls: AtomicUsize,
    }

    impl FixedRates {
        pub fn failing() -> Self {
            Self {
                rates: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with(rates: &[(&str, f64)]) -> Self {
            Self {
                rates: Some(rates.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateSource for FixedRates {
        async fn fetch_rates(&self, _base: &str) -> Result<HashMap<String, f64>, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates
                .clone()
                .ok_or_else(|| RateError::Api("offline".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FixedRates;
    use super::*;
    use crate::storage::SqliteLedgerStorage;

    fn cache(source: Arc<FixedRates>, store: Arc<SqliteLedgerStorage>) -> CurrencyRateCache {
        CurrencyRateCache::new(
            RateCacheConfig {
                failure_backoff: Duration::ZERO,
                ..Default::default()
            },
            store,
            source,
        )
    }

    #[tokio::test]
    async fn test_base_currency_is_identity() {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        let source = Arc::new(FixedRates::failing());
        let cache = cache(source.clone(), store);

        for amount in [0.0, 1.0, 1400.0, 123456.78] {
            assert_eq!(cache.convert(amount, "INR").await, amount);
            assert_eq!(cache.convert(amount, "inr").await, amount);
        }
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_table_used_when_live_cache_empty() {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        let cache = cache(Arc::new(FixedRates::failing()), store);

        for code in static_currency_codes() {
            let expected = 250.0 * static_rate(code, "INR").unwrap();
            assert_eq!(cache.convert(250.0, code).await, expected, "{}", code);
        }
    }

    #[tokio::test]
    async fn test_live_rates_are_inverted_and_cached() {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        let source = Arc::new(FixedRates::with(&[("USD", 0.015625), ("EUR", 0.0078125)]));
        let cache = cache(source.clone(), store.clone());

        assert_eq!(cache.rate("USD").await, 64.0);
        assert_eq!(cache.rate("EUR").await, 128.0);
        assert_eq!(source.calls(), 1);
        assert_eq!(store.load_rates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fresh_store_skips_refresh() {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        let now = chrono::Utc::now().timestamp();
        store
            .replace_rates(&[ExchangeRateCacheEntry {
                currency_code: "USD".to_string(),
                rate: 0.03125,
                updated_at: now,
            }])
            .await
            .unwrap();

        let source = Arc::new(FixedRates::failing());
        let cache = cache(source.clone(), store);
        assert_eq!(cache.rate("USD").await, 32.0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_store_triggers_refresh() {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        let two_days_ago = chrono::Utc::now().timestamp() - 2 * 86_400;
        store
            .replace_rates(&[ExchangeRateCacheEntry {
                currency_code: "USD".to_string(),
                rate: 0.02,
                updated_at: two_days_ago,
            }])
            .await
            .unwrap();

        let source = Arc::new(FixedRates::with(&[("USD", 0.015625)]));
        let cache = cache(source.clone(), store);
        assert_eq!(cache.rate("USD").await, 64.0);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_code_is_treated_as_base() {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        let cache = cache(Arc::new(FixedRates::failing()), store);
        assert_eq!(cache.rate("XYZ").await, 1.0);
    }

    #[test]
    fn test_static_cross_rate() {
        assert_eq!(static_rate("USD", "INR"), Some(83.0));
        assert_eq!(static_rate("INR", "USD"), Some(1.0 / 83.0));
        assert_eq!(static_rate("EUR", "USD"), Some(90.0 / 83.0));
        assert_eq!(static_rate("XYZ", "INR"), None);
    }

    #[tokio::test]
    async fn test_backoff_suppresses_repeated_refresh() {
        let store = Arc::new(SqliteLedgerStorage::in_memory().unwrap());
        let source = Arc::new(FixedRates::failing());
        let cache = CurrencyRateCache::new(RateCacheConfig::default(), store, source.clone());

        cache.rate("USD").await;
        cache.rate("EUR").await;
        assert_eq!(source.calls(), 1);

        assert!(cache.force_refresh().await.is_err());
        assert_eq!(source.calls(), 2);
    }
}
