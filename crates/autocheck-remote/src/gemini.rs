//! Gemini `generateContent` client.
//!
//! Models are tried in order. A model that does not exist (HTTP 404 or a
//! `NOT_FOUND` status in the body) falls through to the next one; any other
//! failure is returned immediately.

use async_trait::async_trait;
use autocheck_core::{parse_verdict, AnalysisError, LlmVerdict, VerdictProvider};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-1.5-flash-001",
    "gemini-1.5-pro-001",
];

const USER_AGENT: &str = concat!("autocheck/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    /// Candidate models, most preferred first.
    pub models: Vec<String>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: GEMINI_API_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Outcome of one model attempt.
enum Attempt {
    Text(String),
    ModelMissing(String),
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, config })
    }

    pub fn models(&self) -> &[String] {
        &self.config.models
    }

    async fn generate(&self, model: &str, prompt: &str) -> std::result::Result<Attempt, AnalysisError> {
        let url = format!("{}/models/{}:generateContent", self.config.api_url, model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Request(e.without_url().to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Request(e.without_url().to_string()))?;

        if is_model_missing(status, &text) {
            return Ok(Attempt::ModelMissing(format!("{model}: HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(AnalysisError::Request(format!(
                "{model}: HTTP {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| AnalysisError::Parse(e.to_string()))?;
        parsed
            .text()
            .map(Attempt::Text)
            .ok_or_else(|| AnalysisError::EmptyResponse(model.to_string()))
    }
}

fn is_model_missing(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND || (!status.is_success() && body.contains("NOT_FOUND"))
}

#[async_trait]
impl VerdictProvider for GeminiClient {
    async fn request_verdict(&self, prompt: &str) -> std::result::Result<LlmVerdict, AnalysisError> {
        let mut last_missing = None;
        for model in &self.config.models {
            match self.generate(model, prompt).await? {
                Attempt::Text(text) => {
                    info!(model = %model, "LLM verdict received");
                    return parse_verdict(&text);
                }
                Attempt::ModelMissing(reason) => {
                    debug!(model = %model, "Model unavailable, trying next");
                    last_missing = Some(reason);
                }
            }
        }
        warn!("No configured Gemini model is available");
        Err(AnalysisError::NoModel(
            last_missing.unwrap_or_else(|| "no models configured".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn response_text_joins_parts() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "{\"verdict\":"}, {"text": " \"ok\"}"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text = response.text().unwrap();
        assert_eq!(parse_verdict(&text).unwrap().verdict, "ok");
    }

    #[test]
    fn response_without_candidates_has_no_text() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn missing_model_detection() {
        assert!(is_model_missing(StatusCode::NOT_FOUND, ""));
        assert!(is_model_missing(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"status": "NOT_FOUND"}}"#
        ));
        assert!(!is_model_missing(StatusCode::TOO_MANY_REQUESTS, "RESOURCE_EXHAUSTED"));
        assert!(!is_model_missing(StatusCode::OK, "NOT_FOUND in a verdict"));
    }

    #[tokio::test]
    async fn empty_model_list_is_no_model_error() {
        let client = GeminiClient::new(GeminiConfig::new("key").with_models(Vec::<String>::new())).unwrap();
        let err = client.request_verdict("prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoModel(_)));
    }

    #[test]
    fn default_models_in_preference_order() {
        let config = GeminiConfig::new("key");
        assert_eq!(config.models.first().map(String::as_str), Some("gemini-1.5-flash"));
        assert_eq!(config.models.len(), DEFAULT_MODELS.len());
    }
}
