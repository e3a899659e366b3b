use super::{RateError, RateSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const OPEN_ER_API_URL: &str = "https://open.er-api.com/v6/latest";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Free exchange rate endpoint, no key required
pub struct OpenErApiSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(default)]
    base_code: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

impl OpenErApiSource {
    pub fn new() -> Result<Self, RateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: OPEN_ER_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn into_rates(
        response: LatestRatesResponse,
        base_currency: &str,
    ) -> Result<HashMap<String, f64>, RateError> {
        if response.result != "success" {
            return Err(RateError::Api(
                response.error_type.unwrap_or(response.result),
            ));
        }
        if let Some(code) = &response.base_code {
            if !code.eq_ignore_ascii_case(base_currency) {
                return Err(RateError::Api(format!(
                    "requested base {} but got {}",
                    base_currency, code
                )));
            }
        }
        Ok(response.rates)
    }
}

#[async_trait]
impl RateSource for OpenErApiSource {
    async fn fetch_rates(&self, base_currency: &str) -> Result<HashMap<String, f64>, RateError> {
        let url = format!("{}/{}", self.base_url, base_currency.to_ascii_uppercase());
        tracing::debug!("Fetching exchange rates from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RateError::Status(response.status().as_u16()));
        }

        let body: LatestRatesResponse = response.json().await?;
        Self::into_rates(body, base_currency)
    }
}
