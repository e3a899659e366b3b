use crate::config::ApiConfig;
use crate::database::Database;
use crate::jobs::ingestion_manager::{IngestionConfig, IngestionManager};
use actix_web::web;
use ledgerly_agents::currency::{CurrencyRateCache, OpenErApiSource, RateCacheConfig, RateSource};
use ledgerly_agents::dedup::DeduplicationEngine;
use ledgerly_agents::llm::{GeminiClient, LlmClient};
use ledgerly_agents::transaction_extractor::{HybridExtractionPipeline, PipelineConfig};
use ledgerly_agents::vision::{VisionConfig, VisionStatementExtractor};
use std::sync::Arc;

/// Everything the handlers share, built once at startup
#[derive(Clone)]
pub struct AppServices {
    pub db: Arc<Database>,
    pub pipeline: Arc<HybridExtractionPipeline>,
    pub dedup: Arc<DeduplicationEngine>,
    pub rates: Arc<CurrencyRateCache>,
    pub vision: Option<Arc<VisionStatementExtractor>>,
    pub ingestion: Arc<IngestionManager>,
}

pub struct ServiceParts {
    pub pipeline: PipelineConfig,
    pub vision: VisionConfig,
    pub rates: RateCacheConfig,
    pub ingestion: IngestionConfig,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub rate_source: Arc<dyn RateSource>,
}

impl AppServices {
    /// Real clients from the config file; no API key means pattern extraction only
    pub fn from_config(config: &ApiConfig, db: Arc<Database>) -> anyhow::Result<Self> {
        let llm = match config.gemini_api_key() {
            Some(key) => Some(Arc::new(GeminiClient::new(key)?) as Arc<dyn LlmClient>),
            None => {
                tracing::warn!(
                    "No gemini_api_key configured, using pattern extraction and no statement parsing"
                );
                None
            }
        };

        let mut rate_source = OpenErApiSource::new()?;
        if let Some(endpoint) = config.rate_endpoint() {
            rate_source = rate_source.with_base_url(endpoint);
        }

        Ok(Self::from_parts(
            db,
            ServiceParts {
                pipeline: config.pipeline_config(),
                vision: config.vision_config(),
                rates: config.rate_cache_config(),
                ingestion: config.ingestion_config(),
                llm,
                rate_source: Arc::new(rate_source),
            },
        ))
    }

    pub fn from_parts(db: Arc<Database>, parts: ServiceParts) -> Self {
        let rates = Arc::new(CurrencyRateCache::new(
            parts.rates,
            db.ledger.clone(),
            parts.rate_source,
        ));
        let pipeline = Arc::new(HybridExtractionPipeline::new(
            parts.pipeline,
            parts.llm.clone(),
            rates.clone(),
            db.ledger.clone(),
        ));
        let vision = parts.llm.map(|llm| {
            Arc::new(VisionStatementExtractor::new(
                parts.vision,
                llm,
                db.ledger.clone(),
            ))
        });
        let dedup = Arc::new(DeduplicationEngine::new(db.ledger.clone()));
        let ingestion = Arc::new(IngestionManager::new(
            db.async_connection.clone(),
            pipeline.clone(),
            dedup.clone(),
            parts.ingestion,
        ));

        Self {
            db,
            pipeline,
            dedup,
            rates,
            vision,
            ingestion,
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.db.clone()))
            .app_data(web::Data::new(self.pipeline.clone()))
            .app_data(web::Data::new(self.dedup.clone()))
            .app_data(web::Data::new(self.rates.clone()))
            .app_data(web::Data::new(self.vision.clone()))
            .app_data(web::Data::new(self.ingestion.clone()));
    }
}
