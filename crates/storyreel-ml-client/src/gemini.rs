//! Gemini text generation client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::capability::TextGenerator;
use crate::error::{MlClientError, MlClientResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// API root, without the `/v1beta` path
    pub base_url: String,
    /// Models tried in order until one answers
    pub models: Vec<String>,
    /// Requested response MIME type, e.g. `application/json`
    pub response_mime_type: Option<String>,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            response_mime_type: Some("application/json".to_string()),
            timeout: Duration::from_secs(120),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> MlClientResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| MlClientError::config("GEMINI_API_KEY not set"))?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if !models.is_empty() {
                config.models = models;
            }
        }
        if let Some(secs) = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
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
struct GenerationConfig<'a> {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'a str,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> MlClientResult<Self> {
        if config.models.is_empty() {
            return Err(MlClientError::config("at least one Gemini model is required"));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> MlClientResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    /// Call one model.
    async fn call_model(&self, model: &str, prompt: &str) -> MlClientResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: self
                .config
                .response_mime_type
                .as_deref()
                .map(|mime| GenerationConfig {
                    response_mime_type: mime,
                }),
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlClientError::request_failed(format!(
                "Gemini API returned {}: {}",
                status, body
            )));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let text: String = gemini_response
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(MlClientError::invalid_response("No content in Gemini response"));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> MlClientResult<String> {
        let mut last_error = None;

        for model in &self.config.models {
            info!(model = %model, "Calling Gemini");
            match self.call_model(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model = %model, error = %e, "Gemini model failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MlClientError::request_failed("All Gemini models failed")))
    }
}
