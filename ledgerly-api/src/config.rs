use config::{Config, ConfigError, File};
use ledgerly_agents::currency::RateCacheConfig;
use ledgerly_agents::transaction_extractor::PipelineConfig;
use ledgerly_agents::vision::VisionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::jobs::ingestion_manager::IngestionConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub api_keys: Option<ApiKeysConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub ingestion: Option<IngestionSettings>,
    pub exchange_rates: Option<ExchangeRatesConfig>,
    pub database: Option<DatabaseConfig>,
    pub cors: Option<CorsConfig>,
    pub server: Option<ServerConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_keys: None,
            extraction: Some(ExtractionConfig::default()),
            ingestion: Some(IngestionSettings::default()),
            exchange_rates: Some(ExchangeRatesConfig::default()),
            database: None,
            cors: Some(CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            }),
            server: Some(ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiKeysConfig {
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_true")]
    pub primary_enabled: bool,
    pub model: Option<String>,
    /// Falls back to `model`
    pub vision_model: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub base_currency: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            primary_enabled: true,
            model: None,
            vision_model: None,
            request_timeout_secs: None,
            base_currency: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct IngestionSettings {
    pub batch_size: Option<usize>,
    pub item_delay_ms: Option<u64>,
    pub wall_clock_budget_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ExchangeRatesConfig {
    pub endpoint: Option<String>,
    pub ttl_hours: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn default_true() -> bool {
    true
}

impl ApiConfig {
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let config_path = get_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        if !config_path.exists() {
            let default_config = r#"
[api_keys]
# gemini_api_key = "your-gemini-key"

[extraction]
primary_enabled = true
# model = "gemini-2.0-flash"
# vision_model = "gemini-2.0-flash"
# request_timeout_secs = 20
# base_currency = "INR"

[ingestion]
# batch_size = 20
# item_delay_ms = 1000
# wall_clock_budget_secs = 25

[exchange_rates]
# endpoint = "https://open.er-api.com/v6/latest"
# ttl_hours = 24

[database]
# path = "/path/to/db.sqlite"

[cors]
allowed_origins = ["http://localhost:3030"]

[server]
host = "127.0.0.1"
port = 8080
"#;
            std::fs::write(&config_path, default_config).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .build()?;

        let config: ApiConfig = builder.try_deserialize()?;

        Ok((config, config_path))
    }

    pub fn gemini_api_key(&self) -> Option<String> {
        self.api_keys
            .as_ref()
            .and_then(|keys| keys.gemini_api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut pipeline = PipelineConfig::default();
        if let Some(extraction) = &self.extraction {
            pipeline.primary_enabled = extraction.primary_enabled;
            if let Some(model) = &extraction.model {
                pipeline.model = model.clone();
            }
            if let Some(secs) = extraction.request_timeout_secs {
                pipeline.request_timeout = Duration::from_secs(secs);
            }
            if let Some(base) = &extraction.base_currency {
                pipeline.base_currency = base.trim().to_ascii_uppercase();
            }
        }
        pipeline
    }

    pub fn vision_config(&self) -> VisionConfig {
        let pipeline = self.pipeline_config();
        let model = self
            .extraction
            .as_ref()
            .and_then(|e| e.vision_model.clone())
            .unwrap_or(pipeline.model);
        VisionConfig {
            model,
            ..Default::default()
        }
    }

    pub fn rate_cache_config(&self) -> RateCacheConfig {
        let mut rates = RateCacheConfig {
            base_currency: self.pipeline_config().base_currency,
            ..Default::default()
        };
        if let Some(hours) = self.exchange_rates.as_ref().and_then(|r| r.ttl_hours) {
            rates.ttl = Duration::from_secs(hours * 3600);
        }
        rates
    }

    pub fn rate_endpoint(&self) -> Option<String> {
        self.exchange_rates
            .as_ref()
            .and_then(|r| r.endpoint.clone())
    }

    pub fn ingestion_config(&self) -> IngestionConfig {
        let mut ingestion = IngestionConfig::default();
        if let Some(settings) = &self.ingestion {
            if let Some(batch_size) = settings.batch_size {
                ingestion.batch_size = batch_size.max(1);
            }
            if let Some(ms) = settings.item_delay_ms {
                ingestion.item_delay = Duration::from_millis(ms);
            }
            if let Some(secs) = settings.wall_clock_budget_secs {
                ingestion.wall_clock_budget = Duration::from_secs(secs);
            }
        }
        ingestion
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.database
            .as_ref()
            .and_then(|db| db.path.as_ref())
            .map(PathBuf::from)
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("ledgerly").join("api.toml")
    } else {
        PathBuf::from("api.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_become_component_configs() {
        let config: ApiConfig = toml::from_str(
            r#"
[extraction]
primary_enabled = false
model = "gemini-2.5-flash"
request_timeout_secs = 5
base_currency = "usd"

[ingestion]
batch_size = 0
item_delay_ms = 250

[exchange_rates]
ttl_hours = 6
"#,
        )
        .unwrap();

        let pipeline = config.pipeline_config();
        assert!(!pipeline.primary_enabled);
        assert_eq!(pipeline.model, "gemini-2.5-flash");
        assert_eq!(pipeline.request_timeout, Duration::from_secs(5));
        assert_eq!(pipeline.base_currency, "USD");

        assert_eq!(config.vision_config().model, "gemini-2.5-flash");
        assert_eq!(config.rate_cache_config().base_currency, "USD");
        assert_eq!(config.rate_cache_config().ttl, Duration::from_secs(6 * 3600));

        let ingestion = config.ingestion_config();
        assert_eq!(ingestion.batch_size, 1);
        assert_eq!(ingestion.item_delay, Duration::from_millis(250));
        assert_eq!(
            ingestion.wall_clock_budget,
            IngestionConfig::default().wall_clock_budget
        );
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config: ApiConfig = toml::from_str(
            r#"
[api_keys]
gemini_api_key = "  "
"#,
        )
        .unwrap();
        assert_eq!(config.gemini_api_key(), None);
        assert!(config.pipeline_config().primary_enabled);
    }
}
