use super::config::PipelineConfig;
use super::system_prompt::{build_extraction_prompt, build_structuring_prompt};
use super::types::ModelTransaction;
use crate::currency::CurrencyRateCache;
use crate::llm::{complete_with_deadline, CompletionRequest, LlmClient};
use crate::storage::CategoryProvider;
use extractors::financial_patterns::{midnight_utc, parse_date};
use extractors::{resolve_category, ContentPreprocessor, DeterministicExtractor, FieldExtraction};
use shared_types::{
    default_category_names, ExtractionError, ExtractionMethod, ParsingDiagnostics, ParsingResult,
    Transaction, TransactionType, UNKNOWN_MERCHANT,
};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_MODEL_CONFIDENCE: f64 = 0.8;
const FALLBACK_CONFIDENCE_WITH_FIELDS: f64 = 0.7;
const FALLBACK_CONFIDENCE_EMPTY: f64 = 0.3;
const NO_TRANSACTION_MARKER: &str = "NO_TRANSACTION";

/// Where one `extract` call currently is
enum Stage {
    Primary,
    Deterministic { primary_failure: Option<ExtractionError> },
    Done(ParsingResult),
}

/// Successful primary attempt before it is wrapped into a `ParsingResult`
struct PrimaryOutcome {
    transaction: Transaction,
    event_date_found: bool,
    currency: Option<String>,
    extraction_response: String,
    raw_response: String,
}

/// Model first, patterns as the safety net; always resolves to a `ParsingResult`
pub struct HybridExtractionPipeline {
    config: PipelineConfig,
    llm: Option<Arc<dyn LlmClient>>,
    rates: Arc<CurrencyRateCache>,
    categories: Arc<dyn CategoryProvider>,
    extractor: DeterministicExtractor,
    preprocessor: ContentPreprocessor,
}

impl HybridExtractionPipeline {
    pub fn new(
        config: PipelineConfig,
        llm: Option<Arc<dyn LlmClient>>,
        rates: Arc<CurrencyRateCache>,
        categories: Arc<dyn CategoryProvider>,
    ) -> Self {
        Self {
            config,
            llm,
            rates,
            categories,
            extractor: DeterministicExtractor::new(),
            preprocessor: ContentPreprocessor::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &DeterministicExtractor {
        &self.extractor
    }

    pub fn preprocessor(&self) -> &ContentPreprocessor {
        &self.preprocessor
    }

    pub fn primary_enabled(&self) -> bool {
        self.config.primary_enabled && self.llm.is_some()
    }

    /// Current active categories; the defaults stand in when the provider fails
    pub async fn active_categories(&self) -> Vec<String> {
        match self.categories.active_categories().await {
            Ok(categories) if !categories.is_empty() => categories,
            Ok(_) => default_category_names(),
            Err(e) => {
                tracing::error!("Failed to load categories, using defaults: {}", e);
                default_category_names()
            }
        }
    }

    /// Preprocesses `body`, falling back to `subject` when no fact lines survive
    pub async fn extract_message(&self, subject: Option<&str>, body: &str) -> ParsingResult {
        let text = self.preprocessor.preprocess(body, subject);
        self.extract_preprocessed(&text).await
    }

    pub async fn extract(&self, text: &str) -> ParsingResult {
        self.extract_message(None, text).await
    }

    async fn extract_preprocessed(&self, text: &str) -> ParsingResult {
        let started = Instant::now();
        let categories = self.active_categories().await;

        let mut stage = if self.primary_enabled() {
            Stage::Primary
        } else {
            tracing::debug!("Primary extraction disabled, using patterns");
            Stage::Deterministic {
                primary_failure: None,
            }
        };

        loop {
            stage = match stage {
                Stage::Primary => match self.attempt_primary(text, &categories).await {
                    Ok(outcome) => Stage::Done(self.primary_result(outcome, started).await),
                    Err(e) => {
                        tracing::warn!("Primary extraction failed, falling back: {}", e);
                        Stage::Deterministic {
                            primary_failure: Some(e),
                        }
                    }
                },
                Stage::Deterministic { primary_failure } => Stage::Done(
                    self.deterministic_result(text, &categories, primary_failure, started)
                        .await,
                ),
                Stage::Done(result) => return result,
            };
        }
    }

    /// Deterministic-only transaction for callers that cannot await
    pub fn quick_parse(&self, text: &str, active_categories: &[String]) -> Transaction {
        self.extractor.quick_parse(text, active_categories)
    }

    async fn attempt_primary(
        &self,
        text: &str,
        categories: &[String],
    ) -> Result<PrimaryOutcome, ExtractionError> {
        let llm = self.llm.as_deref().ok_or(ExtractionError::Disabled)?;
        let deadline = self.config.request_timeout;

        let extraction = complete_with_deadline(
            llm,
            CompletionRequest::text(&self.config.model, format!("Message:\n{}", text))
                .with_system(build_extraction_prompt()),
            deadline,
        )
        .await?;

        let statement = extraction.text.trim().to_string();
        if statement.contains(NO_TRANSACTION_MARKER) {
            return Err(ExtractionError::Schema(
                "model found no transaction".to_string(),
            ));
        }

        let structuring = complete_with_deadline(
            llm,
            CompletionRequest::text(&self.config.model, statement.clone())
                .with_system(build_structuring_prompt(categories, &self.config.base_currency))
                .json(),
            deadline,
        )
        .await?;

        let model = ModelTransaction::from_response(&structuring.text)?;
        let fields = self.extractor.extract_fields(text);
        let currency = model.currency.clone().or_else(|| fields.currency.clone());
        let event_date_found =
            model.date.as_deref().and_then(parse_date).is_some() || fields.date.is_some();
        let transaction = self.reconcile(text, model, &fields, categories);

        Ok(PrimaryOutcome {
            transaction,
            event_date_found,
            currency,
            extraction_response: statement,
            raw_response: structuring.text,
        })
    }

    /// Model output checked against the holder-perspective and account rules
    fn reconcile(
        &self,
        text: &str,
        model: ModelTransaction,
        fields: &FieldExtraction,
        categories: &[String],
    ) -> Transaction {
        let mut transaction = Transaction::blank(text, ExtractionMethod::PrimaryModel);
        transaction.amount = model.amount;

        let model_type: TransactionType = model.transaction_type.into();
        transaction.transaction_type = if fields.type_is_decisive {
            if fields.transaction_type != model_type {
                tracing::debug!(
                    "Overriding model type {} with {}",
                    model_type.as_str(),
                    fields.transaction_type.as_str()
                );
            }
            fields.transaction_type
        } else if model_type == TransactionType::Unknown {
            fields.transaction_type
        } else {
            model_type
        };

        transaction.account_suffix = if fields.account_is_explicit {
            fields.account_suffix.clone()
        } else {
            model
                .account_last_digits
                .or_else(|| fields.account_suffix.clone())
        };

        transaction.merchant = model
            .merchant
            .or_else(|| fields.merchant.clone())
            .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());

        transaction.category = model
            .category
            .as_deref()
            .and_then(|c| resolve_category(c, categories))
            .unwrap_or_else(|| {
                self.extractor
                    .classifier()
                    .classify(&transaction.merchant, categories)
            });

        transaction.transaction_ref = model
            .transaction_id
            .or_else(|| fields.transaction_ref.clone());
        transaction.balance = fields.balance;

        if let Some(ts) = model
            .date
            .as_deref()
            .and_then(parse_date)
            .or(fields.date)
            .and_then(midnight_utc)
        {
            transaction.occurred_at = ts;
        }

        transaction.confidence = model.confidence.unwrap_or(DEFAULT_MODEL_CONFIDENCE);
        transaction.is_parsed =
            transaction.amount > 0.0 && transaction.transaction_type != TransactionType::Unknown;
        transaction
    }

    async fn primary_result(&self, outcome: PrimaryOutcome, started: Instant) -> ParsingResult {
        let PrimaryOutcome {
            mut transaction,
            event_date_found,
            currency,
            extraction_response,
            raw_response,
        } = outcome;

        self.normalize_currency(&mut transaction, currency.as_deref())
            .await;

        ParsingResult {
            success: transaction.is_parsed,
            method: ExtractionMethod::PrimaryModel,
            confidence: transaction.confidence,
            transaction: Some(transaction),
            error: None,
            elapsed_ms: started.elapsed().as_millis() as i64,
            event_date_found,
            diagnostics: ParsingDiagnostics::Model {
                model: self.config.model.clone(),
                extraction_response,
                raw_response,
            },
        }
    }

    async fn deterministic_result(
        &self,
        text: &str,
        categories: &[String],
        primary_failure: Option<ExtractionError>,
        started: Instant,
    ) -> ParsingResult {
        let fields = self.extractor.extract_fields(text);
        let mut transaction = self.extractor.build_transaction(text, &fields, categories);

        transaction.confidence = match &primary_failure {
            None => fields.field_confidence(),
            Some(_) if fields.has_non_type_field() => FALLBACK_CONFIDENCE_WITH_FIELDS,
            Some(_) => FALLBACK_CONFIDENCE_EMPTY,
        };
        transaction.extraction_error = primary_failure.as_ref().map(|e| e.to_string());

        self.normalize_currency(&mut transaction, fields.currency.as_deref())
            .await;

        let error = match &primary_failure {
            Some(e) => Some(e.to_string()),
            None if !transaction.is_parsed => Some("no amount and direction found".to_string()),
            None => None,
        };

        tracing::debug!(
            "Deterministic extraction matched {} fields",
            fields.matched_field_count()
        );

        ParsingResult {
            success: transaction.is_parsed,
            method: ExtractionMethod::Deterministic,
            confidence: transaction.confidence,
            transaction: Some(transaction),
            error,
            elapsed_ms: started.elapsed().as_millis() as i64,
            event_date_found: fields.date.is_some(),
            diagnostics: ParsingDiagnostics::Patterns {
                matched: fields.matched,
                primary_failure: primary_failure.map(|e| e.to_string()),
            },
        }
    }

    /// Converts a foreign amount into base currency, keeping the original
    async fn normalize_currency(&self, transaction: &mut Transaction, currency: Option<&str>) {
        let Some(code) = currency else {
            return;
        };
        if self.rates.is_base(code) || transaction.amount <= 0.0 {
            return;
        }

        let original = transaction.amount;
        let converted = self.rates.convert(original, code).await;
        tracing::debug!("Converted {} {} to {}", original, code, converted);
        transaction.apply_conversion(&code.to_ascii_uppercase(), original, converted);
    }
}
