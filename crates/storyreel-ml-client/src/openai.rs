//! OpenAI image and speech clients.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::{AudioGenerator, ImageGenerator};
use crate::error::{MlClientError, MlClientResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Configuration shared by the OpenAI clients.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// API root, without the `/v1` path
    pub base_url: String,
    pub image_model: String,
    pub image_size: String,
    pub speech_model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            speech_model: "tts-1".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> MlClientResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| MlClientError::config("OPENAI_API_KEY not set"))?;
        let defaults = Self::new(api_key);

        Ok(Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            image_model: std::env::var("OPENAI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            image_size: std::env::var("OPENAI_IMAGE_SIZE").unwrap_or(defaults.image_size),
            speech_model: std::env::var("OPENAI_SPEECH_MODEL").unwrap_or(defaults.speech_model),
            timeout: std::env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            api_key: defaults.api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn http_client(&self) -> MlClientResult<Client> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Turn a non-success response into a `RequestFailed` error.
async fn check_status(
    response: reqwest::Response,
    service: &str,
) -> MlClientResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(MlClientError::request_failed(format!(
        "{} returned {}: {}",
        service, status, body
    )))
}

/// Image generation via `/v1/images/generations`.
pub struct OpenAiImageClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiImageClient {
    pub fn new(config: OpenAiConfig) -> MlClientResult<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }

    pub fn from_env() -> MlClientResult<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate_image(&self, prompt: &str) -> MlClientResult<Vec<u8>> {
        let request = ImageRequest {
            model: &self.config.image_model,
            prompt,
            n: 1,
            size: &self.config.image_size,
            response_format: "b64_json",
        };

        let response = self
            .http
            .post(self.config.endpoint("/v1/images/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, "OpenAI images").await?;

        let body: ImageResponse = response.json().await?;
        let encoded = body
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| MlClientError::invalid_response("No image data in response"))?;

        let bytes = STANDARD.decode(encoded.as_bytes())?;
        debug!(bytes = bytes.len(), "Generated image");
        Ok(bytes)
    }
}

/// Narration via `/v1/audio/speech`.
pub struct OpenAiSpeechClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiSpeechClient {
    pub fn new(config: OpenAiConfig) -> MlClientResult<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }

    pub fn from_env() -> MlClientResult<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }
}

#[async_trait]
impl AudioGenerator for OpenAiSpeechClient {
    async fn generate_audio(&self, text: &str, voice: &str) -> MlClientResult<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.config.speech_model,
            input: text,
            voice,
            response_format: "mp3",
        };

        let response = self
            .http
            .post(self.config.endpoint("/v1/audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response, "OpenAI speech").await?;

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(MlClientError::invalid_response("Empty audio response"));
        }
        debug!(bytes = bytes.len(), voice = %voice, "Generated narration");
        Ok(bytes)
    }
}
