use crate::config::ApiConfig;
use actix_web::{web, HttpResponse, Result};
use shared_types::{ApiKeyConfig, SettingsResponse, UpdateApiKeysRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SettingsAppState {
    pub config: Arc<std::sync::RwLock<ApiConfig>>,
    pub config_path: PathBuf,
}

fn mask_api_key(key: &Option<String>) -> Option<String> {
    key.as_ref().map(|k| {
        let visible: String = k.chars().take(6).collect();
        let hidden = k.chars().count().saturating_sub(6);
        if hidden == 0 {
            return "*".repeat(visible.chars().count());
        }
        let masked = format!("{}{}", visible, "*".repeat(hidden));
        if masked.chars().count() > 40 {
            format!("{}...", masked.chars().take(37).collect::<String>())
        } else {
            masked
        }
    })
}

fn settings_response(config: &ApiConfig, config_path: &std::path::Path) -> SettingsResponse {
    let gemini_key = config.gemini_api_key();
    let pipeline = config.pipeline_config();

    SettingsResponse {
        config_file_path: config_path.to_string_lossy().to_string(),
        api_keys: vec![ApiKeyConfig {
            name: "gemini".to_string(),
            is_configured: gemini_key.is_some(),
            key: mask_api_key(&gemini_key),
        }],
        primary_enabled: pipeline.primary_enabled,
        model: pipeline.model,
        base_currency: pipeline.base_currency,
    }
}

pub async fn get_settings(data: web::Data<SettingsAppState>) -> Result<HttpResponse> {
    let config = data.config.read().map_err(|e| {
        actix_web::error::ErrorInternalServerError(format!(
            "Failed to acquire config read lock: {}",
            e
        ))
    })?;

    Ok(HttpResponse::Ok().json(settings_response(&config, &data.config_path)))
}

/// Rewrites the config file; the running pipeline picks the key up on restart
pub async fn update_api_keys(
    data: web::Data<SettingsAppState>,
    request: web::Json<UpdateApiKeysRequest>,
) -> Result<HttpResponse> {
    let req = request.into_inner();

    let mut config = data.config.write().map_err(|e| {
        actix_web::error::ErrorInternalServerError(format!(
            "Failed to acquire config write lock: {}",
            e
        ))
    })?;

    if let Some(gemini_key) = req.gemini_api_key {
        let gemini_key = gemini_key.trim().to_string();
        let keys = config
            .api_keys
            .get_or_insert(crate::config::ApiKeysConfig {
                gemini_api_key: None,
            });
        keys.gemini_api_key = if gemini_key.is_empty() {
            None
        } else {
            Some(gemini_key)
        };
    }

    let toml_string = toml::to_string(&*config).map_err(|e| {
        actix_web::error::ErrorInternalServerError(format!("Failed to serialize config: {}", e))
    })?;

    std::fs::write(&data.config_path, toml_string).map_err(|e| {
        actix_web::error::ErrorInternalServerError(format!("Failed to write config file: {}", e))
    })?;

    info!("Updated API keys in settings");

    Ok(HttpResponse::Ok().json(settings_response(&config, &data.config_path)))
}
