use crate::database::Database;
use crate::handlers;
use crate::jobs::ingestion_manager::IngestionConfig;
use crate::services::{AppServices, ServiceParts};
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::App;
use async_trait::async_trait;
use ledgerly_agents::currency::{RateCacheConfig, RateError, RateSource};
use ledgerly_agents::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use ledgerly_agents::transaction_extractor::PipelineConfig;
use ledgerly_agents::vision::VisionConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct Offline;

#[async_trait]
impl RateSource for Offline {
    async fn fetch_rates(&self, _base: &str) -> Result<HashMap<String, f64>, RateError> {
        Err(RateError::Api("offline".to_string()))
    }
}

struct CannedReplies(Mutex<VecDeque<&'static str>>);

#[async_trait]
impl LlmClient for CannedReplies {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let next = self.0.lock().unwrap().pop_front();
        next.map(|text| CompletionResponse {
            text: text.to_string(),
            model: request.model,
        })
        .ok_or(LlmError::EmptyResponse)
    }
}

/// Services over a throwaway database file, offline rates and pattern extraction
pub struct TestApp {
    _dir: TempDir,
    pub db: Arc<Database>,
    pub services: AppServices,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// The replies feed statement parsing only; text extraction stays on patterns
    pub fn with_model_replies(replies: Vec<&'static str>) -> Self {
        Self::build(Some(Arc::new(CannedReplies(Mutex::new(replies.into())))))
    }

    fn build(llm: Option<Arc<dyn LlmClient>>) -> Self {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("db.sqlite")).unwrap());
        let services = AppServices::from_parts(
            db.clone(),
            ServiceParts {
                pipeline: PipelineConfig::deterministic_only(),
                vision: VisionConfig {
                    page_delay: Duration::ZERO,
                    ..Default::default()
                },
                rates: RateCacheConfig::default(),
                ingestion: IngestionConfig {
                    item_delay: Duration::ZERO,
                    ..Default::default()
                },
                llm,
                rate_source: Arc::new(Offline),
            },
        );
        Self {
            _dir: dir,
            db,
            services,
        }
    }

    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let services = self.services.clone();
        App::new()
            .configure(move |cfg| services.register(cfg))
            .configure(handlers::api_routes)
    }
}
