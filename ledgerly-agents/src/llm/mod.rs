//! Text and image understanding capability.
//!
//! The pipeline and the vision extractor only see [`LlmClient`]; the Gemini
//! REST client is one implementation, tests use scripted fakes.

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use shared_types::ExtractionError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Failed to decode model response: {0}")]
    Decode(String),

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),
}

impl From<LlmError> for ExtractionError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http(e) => ExtractionError::Transport(e.to_string()),
            LlmError::Status { status, body } => ExtractionError::Status { status, body },
            LlmError::EmptyResponse => ExtractionError::EmptyResponse,
            LlmError::Decode(msg) => ExtractionError::Schema(msg),
            LlmError::MissingApiKey(provider) => {
                ExtractionError::Config(format!("missing API key for {}", provider))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineImage { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub parts: Vec<ContentPart>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Ask the provider for a JSON document instead of prose
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn text(model: &str, prompt: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            system: None,
            parts: vec![ContentPart::Text(prompt.into())],
            temperature: Some(0.0),
            max_output_tokens: None,
            json_output: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, mime_type: &str, data: Vec<u8>) -> Self {
        self.parts.push(ContentPart::InlineImage {
            mime_type: mime_type.to_string(),
            data,
        });
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Runs `complete` under a fixed deadline; an elapsed deadline is a transport failure
pub async fn complete_with_deadline(
    client: &dyn LlmClient,
    request: CompletionRequest,
    deadline: Duration,
) -> Result<CompletionResponse, ExtractionError> {
    match tokio::time::timeout(deadline, client.complete(request)).await {
        Ok(Ok(response)) if response.text.trim().is_empty() => Err(ExtractionError::EmptyResponse),
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ExtractionError::Timeout(deadline.as_millis() as u64)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub enum Scripted {
        Reply(&'static str),
        Fail(LlmError),
        Hang,
    }

    /// Replays scripted replies in order and records every request
    pub struct ScriptedLlm {
        replies: Mutex<VecDeque<Scripted>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub fn new(replies: Vec<Scripted>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Reply(text)) => Ok(CompletionResponse {
                    text: text.to_string(),
                    model,
                }),
                Some(Scripted::Fail(e)) => Err(e),
                Some(Scripted::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LlmError::EmptyResponse)
                }
                None => Err(LlmError::EmptyResponse),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedLlm};
    use super::*;

    #[tokio::test]
    async fn test_deadline_turns_into_timeout() {
        let llm = ScriptedLlm::new(vec![Scripted::Hang]);
        let err = complete_with_deadline(
            &llm,
            CompletionRequest::text("m", "hi"),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert_eq!(err, ExtractionError::Timeout(20));
        assert_eq!(err.to_string(), "Request timed out after 20ms");
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_response() {
        let llm = ScriptedLlm::new(vec![Scripted::Reply("   ")]);
        let err = complete_with_deadline(
            &llm,
            CompletionRequest::text("m", "hi"),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert_eq!(err, ExtractionError::EmptyResponse);
    }

    #[test]
    fn test_status_error_maps_to_extraction_error() {
        let err: ExtractionError = LlmError::Status {
            status: 429,
            body: "quota".to_string(),
        }
        .into();
        assert!(matches!(err, ExtractionError::Status { status: 429, .. }));
    }
}
