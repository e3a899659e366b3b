use super::{CompletionRequest, CompletionResponse, ContentPart, LlmClient, LlmError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Google Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey("gemini"));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(request: &CompletionRequest) -> GenerateContentRequest {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => GeminiPart::Text { text: text.clone() },
                ContentPart::InlineImage { mime_type, data } => GeminiPart::Inline {
                    inline_data: InlineData {
                        mime_type: mime_type.clone(),
                        data: STANDARD.encode(data),
                    },
                },
            })
            .collect();

        GenerateContentRequest {
            system_instruction: request.system.as_ref().map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: system.clone(),
                }],
            }),
            contents: vec![GeminiContent {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                response_mime_type: request.json_output.then_some("application/json"),
            },
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        tracing::debug!("Calling Gemini model {}", request.model);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(CompletionResponse {
            text,
            model: request.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  "),
            Err(LlmError::MissingApiKey("gemini"))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest::text("gemini-2.0-flash", "extract this")
            .with_system("you are a parser")
            .with_image("image/png", vec![1, 2, 3])
            .json();

        let body = serde_json::to_value(GeminiClient::build_body(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "you are a parser");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "extract this");
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["data"], "AQID");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }
}
