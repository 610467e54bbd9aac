//! HTTP-backed capabilities.
//!
//! - OpenAI-compatible chat completions (`/v1/chat/completions`)
//! - Ollama chat (`/api/chat`)
//! - OpenAI-compatible image generation (`/v1/images/generations`)
//! - ElevenLabs-compatible text-to-speech (`/v1/text-to-speech/<voice>`)

use crate::config::{Config, ImageConfig, LlmConfig, LlmProvider, SpeechConfig};
use crate::error::{Error, Result};
use crate::services::{
    CompletionService, GeneratedImage, ImageGenerator, ImageRequest, Services, SpeechSynthesizer,
};
use crate::types::{ChatMessage, ContentPart, WireContent};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_IMAGE_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_SPEECH_ENDPOINT: &str = "https://api.elevenlabs.io";

/// Build every capability that has a config section.
pub fn build_services(config: &Config) -> Result<Services> {
    let mut services = Services::default();
    if let Some(llm) = &config.completion {
        services.completion = Some(Arc::new(HttpCompletionClient::new(
            "completion",
            llm,
            "OPENAI_API_KEY",
        )?));
    }
    if let Some(llm) = &config.realtime {
        services.realtime = Some(Arc::new(HttpCompletionClient::new(
            "realtime",
            llm,
            "GEMINI_API_KEY",
        )?));
    }
    if let Some(image) = &config.image {
        services.image = Some(Arc::new(HttpImageClient::new(image)?));
    }
    if let Some(speech) = &config.speech {
        services.speech = Some(Arc::new(HttpSpeechClient::new(speech)?));
    }
    tracing::debug!(
        completion = services.completion.is_some(),
        realtime = services.realtime.is_some(),
        image = services.image.is_some(),
        speech = services.speech.is_some(),
        "Configured capabilities"
    );
    Ok(services)
}

fn resolve_api_key(explicit: Option<&str>, env_var: &str) -> Option<String> {
    explicit
        .map(ToString::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
}

fn http_client(service: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| Error::service(service, format!("failed to build HTTP client: {e}")))
}

fn bearer(service: &str, api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| Error::service(service, format!("invalid auth header: {e}")))?,
    );
    Ok(headers)
}

/// Send a request and return the body of a successful response.
async fn send(service: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let resp = request
        .send()
        .await
        .map_err(|e| Error::service(service, format!("request failed: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::service(
            service,
            format!("returned {}: {}", status.as_u16(), body),
        ));
    }
    Ok(resp)
}

async fn send_json(service: &str, request: reqwest::RequestBuilder) -> Result<Value> {
    let body = send(service, request)
        .await?
        .text()
        .await
        .map_err(|e| Error::service(service, format!("read body failed: {e}")))?;
    Ok(serde_json::from_str(&body)?)
}

// ============================================
// Chat completions
// ============================================

pub struct HttpCompletionClient {
    service: &'static str,
    model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpCompletionClient {
    /// `key_env` names the environment variable consulted when the section
    /// has no `api_key`.
    pub fn new(service: &'static str, config: &LlmConfig, key_env: &str) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());
        let api_key = match config.provider {
            LlmProvider::Ollama => None,
            LlmProvider::OpenAI => resolve_api_key(config.api_key.as_deref(), key_env),
        };
        if config.provider == LlmProvider::OpenAI && api_key.is_none() {
            return Err(Error::Config(format!(
                "{service}.api_key (or {key_env}) is required"
            )));
        }

        Ok(Self {
            service,
            model: config.model.clone(),
            provider: config.provider,
            endpoint,
            api_key,
            http: http_client(service, config.timeout_secs)?,
        })
    }
}

/// Ollama takes images as bare base64 beside the text.
fn ollama_message(message: &ChatMessage) -> Value {
    let images: Vec<&str> = match &message.content {
        WireContent::Text(_) => Vec::new(),
        WireContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ImageUrl { image_url } => {
                    Some(image_url.url.split_once(',').map_or(image_url.url.as_str(), |(_, b)| b))
                }
                ContentPart::Text { .. } => None,
            })
            .collect(),
    };
    let mut value = json!({ "role": message.role, "content": message.content.text() });
    if !images.is_empty() {
        value["images"] = json!(images);
    }
    value
}

fn string_at<'a>(json: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = json;
    for key in path {
        current = match key.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(*key)?,
        };
    }
    current.as_str()
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let base = self.endpoint.trim_end_matches('/');
        let content = match self.provider {
            LlmProvider::Ollama => {
                let body = json!({
                    "model": self.model,
                    "messages": messages.iter().map(ollama_message).collect::<Vec<_>>(),
                    "stream": false,
                });
                let json = send_json(self.service, self.http.post(format!("{base}/api/chat")).json(&body)).await?;
                string_at(&json, &["message", "content"]).map(ToString::to_string)
            }
            LlmProvider::OpenAI => {
                let headers = bearer(self.service, self.api_key.as_deref().unwrap_or_default())?;
                let body = json!({ "model": self.model, "messages": messages });
                let request = self
                    .http
                    .post(format!("{base}/v1/chat/completions"))
                    .headers(headers)
                    .json(&body);
                let json = send_json(self.service, request).await?;
                string_at(&json, &["choices", "0", "message", "content"]).map(ToString::to_string)
            }
        };

        match content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(Error::service(
                self.service,
                "received an empty or invalid response",
            )),
        }
    }
}

// ============================================
// Image generation
// ============================================

pub struct HttpImageClient {
    model: String,
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpImageClient {
    pub fn new(config: &ImageConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), "OPENAI_API_KEY")
            .ok_or_else(|| Error::Config("image.api_key (or OPENAI_API_KEY) is required".to_string()))?;
        Ok(Self {
            model: config.model.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_ENDPOINT.to_string()),
            api_key,
            http: http_client("image", config.timeout_secs)?,
        })
    }
}

/// Map an aspect-ratio token (`w:h`) to a supported size.
pub fn size_for_aspect_ratio(ratio: &str) -> &'static str {
    let parsed = ratio
        .split_once(':')
        .and_then(|(w, h)| Some((w.trim().parse::<f64>().ok()?, h.trim().parse::<f64>().ok()?)));
    match parsed {
        Some((w, h)) if w > h => "1792x1024",
        Some((w, h)) if w < h => "1024x1792",
        _ => "1024x1024",
    }
}

#[async_trait]
impl ImageGenerator for HttpImageClient {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let base = self.endpoint.trim_end_matches('/');
        let body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "n": 1,
            "size": size_for_aspect_ratio(&request.aspect_ratio),
        });
        let http_request = self
            .http
            .post(format!("{base}/v1/images/generations"))
            .headers(bearer("image", &self.api_key)?)
            .json(&body);
        let json = send_json("image", http_request).await?;
        string_at(&json, &["data", "0", "url"])
            .map(|url| GeneratedImage {
                url: url.to_string(),
            })
            .ok_or_else(|| Error::service("image", "response missing data[0].url"))
    }
}

// ============================================
// Text-to-speech
// ============================================

pub struct HttpSpeechClient {
    config: SpeechConfig,
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpSpeechClient {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), "ELEVENLABS_API_KEY").ok_or_else(
            || Error::Config("speech.api_key (or ELEVENLABS_API_KEY) is required".to_string()),
        )?;
        Ok(Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_SPEECH_ENDPOINT.to_string()),
            api_key,
            http: http_client("speech", config.timeout_secs)?,
            config: config.clone(),
        })
    }

    fn body(&self, text: &str) -> Value {
        json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost,
            },
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.endpoint.trim_end_matches('/'),
            self.config.voice_id
        );
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("audio/mpeg"));
        headers.insert(
            "xi-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::service("speech", format!("invalid api key header: {e}")))?,
        );

        let resp = send("speech", self.http.post(url).headers(headers).json(&self.body(text))).await?;
        let audio = resp
            .bytes()
            .await
            .map_err(|e| Error::service("speech", format!("read body failed: {e}")))?;
        if audio.is_empty() {
            return Err(Error::service("speech", "received empty audio"));
        }
        Ok(audio.to_vec())
    }
}
