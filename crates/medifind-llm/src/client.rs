//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const TEMPERATURE: f64 = 0.7;
pub const MAX_OUTPUT_TOKENS: u32 = 500;

/// Reply shown when the provider could not be reached or refused the call.
pub const CONNECTION_FALLBACK: &str =
    "I'm having trouble connecting right now. Please try again in a moment.";

/// Reply shown when the provider answered without any text.
pub const EMPTY_REPLY_FALLBACK: &str = "I'm sorry, I couldn't process that. Please try again.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ChatError {
    /// Fixed text to show in place of the reply.
    pub fn fallback_reply(&self) -> &'static str {
        match self {
            ChatError::EmptyResponse => EMPTY_REPLY_FALLBACK,
            _ => CONNECTION_FALLBACK,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Anything that turns a prompt into reply text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> ChatResult<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        Self {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }
}

#[derive(Deserialize, Default)]
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

/// Text of the first part of the first candidate.
fn reply_text(response: GenerateContentResponse) -> ChatResult<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .filter(|text| !text.is_empty())
        .ok_or(ChatError::EmptyResponse)
}

/// Client for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> ChatResult<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting completion");

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateContentRequest::new(prompt))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion request rejected");
            return Err(ChatError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.without_url().to_string()))?;
        reply_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ChatResult<String> {
        reply_text(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateContentRequest::new("hello")).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"parts": [{"text": "hello"}]}],
                "generationConfig": {"temperature": 0.7, "maxOutputTokens": 500}
            })
        );
    }

    #[test]
    fn test_reads_first_candidate_first_part() {
        let reply = parse(json!({
            "candidates": [
                {"content": {"parts": [{"text": "first"}, {"text": "second"}]}},
                {"content": {"parts": [{"text": "other"}]}}
            ]
        }));
        assert_eq!(reply, Ok("first".to_string()));
    }

    #[test]
    fn test_missing_text_is_empty_response() {
        assert_eq!(parse(json!({})), Err(ChatError::EmptyResponse));
        assert_eq!(parse(json!({"candidates": []})), Err(ChatError::EmptyResponse));
        assert_eq!(
            parse(json!({"candidates": [{"finishReason": "SAFETY"}]})),
            Err(ChatError::EmptyResponse)
        );
        assert_eq!(
            parse(json!({"candidates": [{"content": {"parts": [{"text": ""}]}}]})),
            Err(ChatError::EmptyResponse)
        );
    }

    #[test]
    fn test_fallback_replies() {
        assert_eq!(ChatError::EmptyResponse.fallback_reply(), EMPTY_REPLY_FALLBACK);
        assert_eq!(
            ChatError::Http { status: 429, message: String::new() }.fallback_reply(),
            CONNECTION_FALLBACK
        );
        assert_eq!(ChatError::Decode("eof".into()).fallback_reply(), CONNECTION_FALLBACK);
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new("k").with_base_url("http://localhost:9000/v1/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = GeminiClient::new("k")
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Network(_)));
    }
}
