use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use ledgerly_api::handlers::settings::{self, SettingsAppState};
use ledgerly_api::{config, handlers, helpers, AppServices, Database};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[get("/health")]
async fn health(db: web::Data<Arc<Database>>) -> impl Responder {
    match db.ping() {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "connected"
        })),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "status": "unhealthy",
                "database": "disconnected"
            }))
        }
    }
}

#[get("/settings")]
async fn get_settings(data: web::Data<SettingsAppState>) -> actix_web::Result<HttpResponse> {
    settings::get_settings(data).await
}

#[post("/settings/api-keys")]
async fn update_api_keys(
    data: web::Data<SettingsAppState>,
    request: web::Json<shared_types::UpdateApiKeysRequest>,
) -> actix_web::Result<HttpResponse> {
    settings::update_api_keys(data, request).await
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    log_file_path: Option<String>,

    /// Run one sync of pending messages at startup
    #[arg(long)]
    sync_on_start: bool,
}

fn init_tracing(log_file_path: Option<String>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = log_file_path {
        let log_path = std::path::Path::new(&log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("ledgerly-api.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file_path);

    let (config, config_path) =
        config::ApiConfig::load().map_err(|e| startup_error("Failed to load config", e))?;

    let (db, db_path) = helpers::database::initialize_database(config.database_path())
        .map_err(|e| startup_error("Failed to initialize database", e))?;
    tracing::info!("Database initialized at: {:?}", db_path);

    let services = AppServices::from_config(&config, db.clone())
        .map_err(|e| startup_error("Failed to build services", e))?;
    tracing::info!(
        "Primary extraction {}, base currency {}",
        if services.pipeline.primary_enabled() {
            "enabled"
        } else {
            "disabled"
        },
        services.pipeline.config().base_currency
    );

    let settings_state = SettingsAppState {
        config: Arc::new(std::sync::RwLock::new(config.clone())),
        config_path,
    };

    let (host, port) = if let Some(server_config) = &config.server {
        (server_config.host.clone(), server_config.port)
    } else {
        ("127.0.0.1".to_string(), 8080)
    };

    if args.sync_on_start {
        let ingestion = services.ingestion.clone();
        tokio::spawn(async move {
            match ingestion.sync_pending().await {
                Ok(report) => tracing::info!(
                    "Startup sync inserted {}, {} still pending",
                    report.inserted,
                    report.remaining
                ),
                Err(e) => tracing::warn!("Startup sync failed: {}", e),
            }
        });
    }

    tracing::info!("Starting server on {}:{}", host, port);

    let cors_config = config.cors.clone();
    let server = HttpServer::new(move || {
        let cors = if let Some(cors_config) = &cors_config {
            let mut cors_builder = Cors::default();
            for origin in &cors_config.allowed_origins {
                cors_builder = cors_builder.allowed_origin(origin);
            }
            cors_builder
                .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Accept", "Content-Type"])
                .max_age(3600)
        } else {
            Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Accept", "Content-Type"])
                .max_age(3600)
        };

        let services = services.clone();
        App::new()
            .wrap(cors)
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
            .app_data(web::Data::new(settings_state.clone()))
            .configure(move |cfg| services.register(cfg))
            .service(health)
            .service(get_settings)
            .service(update_api_keys)
            .configure(handlers::api_routes)
    })
    .bind((host.as_str(), port))?
    .run();

    let handle = server.handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        tracing::info!("Ctrl+C received, shutting down...");
        handle.stop(true).await;
    });

    server.await
}
