use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Everything the pipeline needs to know about its environment
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub primary_enabled: bool,
    pub model: String,
    /// Deadline applied to each model call separately
    pub request_timeout: Duration,
    pub base_currency: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary_enabled: true,
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            base_currency: "INR".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn deterministic_only() -> Self {
        Self {
            primary_enabled: false,
            ..Default::default()
        }
    }
}
