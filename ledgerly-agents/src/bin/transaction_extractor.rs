use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use config::{Config, File};
use rusqlite::Connection;
use serde::Deserialize;
use shared_types::{IngestTextResponse, ParsingResult, StatementCandidate, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledgerly_agents::currency::{CurrencyRateCache, OpenErApiSource, RateCacheConfig};
use ledgerly_agents::dedup::DeduplicationEngine;
use ledgerly_agents::llm::{GeminiClient, LlmClient};
use ledgerly_agents::storage::{initialize_schema, SqliteLedgerStorage};
use ledgerly_agents::transaction_extractor::{HybridExtractionPipeline, PipelineConfig};
use ledgerly_agents::vision::{VisionConfig, VisionStatementExtractor};

#[derive(Parser, Debug)]
#[command(
    name = "transaction-extractor",
    about = "Extract financial transactions from notification text, emails, SMS backups or statement images"
)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["text", "eml_path", "sms_csv", "image"]),
))]
struct Cli {
    /// Raw notification text
    #[arg(long, group = "input")]
    text: Option<String>,

    /// Path to a .eml file
    #[arg(long, value_name = "PATH", group = "input")]
    eml_path: Option<PathBuf>,

    /// Path to an SMS backup CSV (address,body,date[,id])
    #[arg(long, value_name = "PATH", group = "input")]
    sms_csv: Option<PathBuf>,

    /// Path to a statement page image
    #[arg(long, value_name = "PATH", group = "input")]
    image: Option<PathBuf>,

    /// Skip the model and use pattern extraction only
    #[arg(long)]
    no_primary: bool,

    /// Store results (with duplicate checks) in the configured database
    #[arg(long)]
    persist: bool,

    /// Override the Gemini model ID
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct CliConfig {
    api_keys: Option<ApiKeysConfig>,
    extraction: Option<ExtractionConfig>,
    exchange_rates: Option<ExchangeRatesConfig>,
    database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize, Clone)]
struct ApiKeysConfig {
    gemini_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct ExtractionConfig {
    primary_enabled: Option<bool>,
    model: Option<String>,
    vision_model: Option<String>,
    request_timeout_secs: Option<u64>,
    base_currency: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct ExchangeRatesConfig {
    endpoint: Option<String>,
    ttl_hours: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
struct DatabaseConfig {
    path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config()?;
    let extraction = config.extraction.clone();

    let mut pipeline_config = PipelineConfig::default();
    if let Some(extraction) = &extraction {
        if let Some(enabled) = extraction.primary_enabled {
            pipeline_config.primary_enabled = enabled;
        }
        if let Some(model) = &extraction.model {
            pipeline_config.model = model.clone();
        }
        if let Some(secs) = extraction.request_timeout_secs {
            pipeline_config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(base) = &extraction.base_currency {
            pipeline_config.base_currency = base.to_ascii_uppercase();
        }
    }
    if let Some(model) = &cli.model {
        pipeline_config.model = model.clone();
    }
    if cli.no_primary {
        pipeline_config.primary_enabled = false;
    }

    let llm = build_llm(&config, pipeline_config.primary_enabled || cli.image.is_some());

    let storage = Arc::new(open_storage(&config, cli.persist)?);

    let mut rate_config = RateCacheConfig {
        base_currency: pipeline_config.base_currency.clone(),
        ..Default::default()
    };
    let mut rate_source = OpenErApiSource::new()?;
    if let Some(rates) = &config.exchange_rates {
        if let Some(hours) = rates.ttl_hours {
            rate_config.ttl = Duration::from_secs(hours * 3600);
        }
        if let Some(endpoint) = &rates.endpoint {
            rate_source = rate_source.with_base_url(endpoint.clone());
        }
    }
    let rates = Arc::new(CurrencyRateCache::new(
        rate_config,
        storage.clone(),
        Arc::new(rate_source),
    ));

    let dedup = DeduplicationEngine::new(storage.clone());

    if let Some(path) = &cli.image {
        let llm = llm.ok_or_else(|| {
            anyhow::anyhow!("Statement images need gemini_api_key in the config file")
        })?;
        let vision_model = extraction
            .as_ref()
            .and_then(|e| e.vision_model.clone())
            .unwrap_or_else(|| pipeline_config.model.clone());
        let vision = VisionStatementExtractor::new(
            VisionConfig {
                model: vision_model,
                ..Default::default()
            },
            llm,
            storage.clone(),
        );

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image at {:?}", path))?;
        let candidates = vision.parse_page(&bytes, mime_type_for(path)).await;

        let mut output = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            output.push(persist_or_pass(&dedup, candidate, cli.persist).await?);
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let pipeline = HybridExtractionPipeline::new(pipeline_config, llm, rates, storage.clone());

    let inputs: Vec<(Option<String>, Option<String>, String)> =
        match (&cli.text, &cli.eml_path, &cli.sms_csv) {
            (Some(text), None, None) => vec![(None, None, text.clone())],
            (None, Some(path), None) => {
                let (subject, body, message_id) = load_email_from_eml(path)?;
                vec![(message_id, Some(subject), body)]
            }
            (None, None, Some(path)) => load_sms_export(path)?,
            _ => unreachable!("clap enforces exactly one input"),
        };

    let mut output = Vec::with_capacity(inputs.len());
    for (source_id, subject, body) in inputs {
        let parsing = if cli.text.is_some() {
            pipeline.extract(&body).await
        } else {
            pipeline.extract_message(subject.as_deref(), &body).await
        };

        if !cli.persist {
            output.push(serde_json::to_value(&parsing)?);
            continue;
        }

        let response = ingest(&dedup, parsing, source_id).await?;
        output.push(serde_json::to_value(&response)?);
    }

    if output.len() == 1 {
        println!("{}", serde_json::to_string_pretty(&output[0])?);
    } else {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config() -> Result<CliConfig> {
    let config_path = get_config_path();
    if !config_path.exists() {
        tracing::warn!(
            "Config file not found at {:?}, using defaults without an API key",
            config_path
        );
        return Ok(CliConfig::default());
    }

    let builder = Config::builder()
        .add_source(File::from(config_path.clone()))
        .build()?;
    let config: CliConfig = builder
        .try_deserialize()
        .with_context(|| format!("Invalid config at {:?}", config_path))?;
    Ok(config)
}

fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("ledgerly").join("api.toml")
    } else {
        PathBuf::from("api.toml")
    }
}

fn build_llm(config: &CliConfig, wanted: bool) -> Option<Arc<dyn LlmClient>> {
    if !wanted {
        return None;
    }
    let key = config
        .api_keys
        .as_ref()
        .and_then(|keys| keys.gemini_api_key.clone())
        .unwrap_or_default();

    match GeminiClient::new(key) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn LlmClient>),
        Err(e) => {
            tracing::warn!("Model extraction unavailable: {}", e);
            None
        }
    }
}

fn open_storage(config: &CliConfig, persist: bool) -> Result<SqliteLedgerStorage> {
    if !persist {
        return SqliteLedgerStorage::in_memory();
    }

    let db_path = resolve_db_path(config)?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open db at {:?}", db_path))?;
    initialize_schema(&conn)?;
    tracing::info!("Persisting into {:?}", db_path);
    Ok(SqliteLedgerStorage::new(Arc::new(Mutex::new(conn))))
}

fn resolve_db_path(config: &CliConfig) -> Result<PathBuf> {
    if let Some(path) = config.database.as_ref().and_then(|db| db.path.as_ref()) {
        return Ok(PathBuf::from(path));
    }

    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;
    Ok(data_dir.join("ledgerly").join("db.sqlite"))
}

fn load_email_from_eml(path: &Path) -> Result<(String, String, Option<String>)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read .eml file at {:?}", path))?;
    let parser = mail_parser::MessageParser::default();
    let parsed = parser
        .parse(&bytes)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse .eml file"))?;

    let subject = parsed.subject().map(|s| s.to_string()).unwrap_or_default();
    let body = parsed
        .body_html(0)
        .map(|s| s.to_string())
        .or_else(|| parsed.body_text(0).map(|s| s.to_string()))
        .ok_or_else(|| anyhow::anyhow!("Email has no body text or HTML"))?;
    let message_id = parsed.message_id().map(|id| format!("email:{}", id));

    Ok((subject, body, message_id))
}

fn load_sms_export(path: &Path) -> Result<Vec<(Option<String>, Option<String>, String)>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read SMS export at {:?}", path))?;
    let messages = extractors::SmsExportParser::new().parse(&bytes)?;
    tracing::info!("Loaded {} messages from {:?}", messages.len(), path);
    Ok(messages
        .into_iter()
        .map(|m| (Some(m.source_id), None, m.body))
        .collect())
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/png",
    }
}

async fn ingest(
    dedup: &DeduplicationEngine,
    parsing: ParsingResult,
    source_id: Option<String>,
) -> Result<IngestTextResponse> {
    let mut transaction = parsing
        .transaction
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Extraction produced no transaction"))?;
    transaction.source_id = source_id;

    let outcome = dedup.insert(transaction).await?;
    Ok(IngestTextResponse {
        duplicate: outcome.is_duplicate(),
        transaction: outcome.into_transaction(),
        parsing,
    })
}

async fn persist_or_pass(
    dedup: &DeduplicationEngine,
    candidate: Transaction,
    persist: bool,
) -> Result<StatementCandidate> {
    if !persist {
        return Ok(StatementCandidate {
            transaction: candidate,
            duplicate: false,
        });
    }
    let outcome = dedup.insert(candidate).await?;
    Ok(StatementCandidate {
        duplicate: outcome.is_duplicate(),
        transaction: outcome.into_transaction(),
    })
}
