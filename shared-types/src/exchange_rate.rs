use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Cached row: 1 base unit = `rate` units of `currency_code`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRateCacheEntry {
    pub currency_code: String,
    pub rate: f64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRatesResponse {
    pub base_currency: String,
    pub rates: Vec<ExchangeRateCacheEntry>,
    pub is_fresh: bool,
}
