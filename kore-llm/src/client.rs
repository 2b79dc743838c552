//! HTTP providers: Ollama (local) and OpenAI-compatible (hosted) chat APIs.
//!
//! Neither provider retries: a failed call surfaces as an [`LlmError`] and
//! the caller decides what to do. Request bodies and response parsing are
//! plain functions so they can be checked without a server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kore_core::config::ProviderConfig;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::provider::Provider;
use crate::types::Message;

/// Build a provider from config.
///
/// # Errors
/// Returns `LlmError::ConfigError` for an unknown kind or a missing API key.
pub fn from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, LlmError> {
    match config.kind.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.base_url(), &config.model)
            .with_timeout(Duration::from_millis(config.timeout_ms))
            .with_max_tokens(config.max_tokens))),
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                LlmError::ConfigError(format!("environment variable {} is not set", config.api_key_env))
            })?;
            Ok(Arc::new(OpenAiProvider::new(config.base_url(), api_key, &config.model)
                .with_timeout(Duration::from_millis(config.timeout_ms))
                .with_max_tokens(config.max_tokens)))
        }
        "none" => Ok(Arc::new(UnavailableProvider)),
        other => Err(LlmError::ConfigError(format!("unknown provider kind '{other}'"))),
    }
}

fn wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout.as_millis() as u64)
    } else {
        LlmError::from(err)
    }
}

async fn post_json(
    request: reqwest::RequestBuilder,
    timeout: Duration,
    backend: &str,
) -> Result<Value, LlmError> {
    let resp = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_send_error(e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(backend, %status, "LLM backend returned error");
        return Err(LlmError::RequestFailed(format!("HTTP {status}: {body}")));
    }

    resp.json::<Value>()
        .await
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

/// Locally hosted model served by Ollama's `/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    http: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
    name: String,
}

impl OllamaProvider {
    /// Create a provider for `model` at `base_url` (e.g. `http://localhost:11434`).
    #[must_use]
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(30),
            max_tokens: 1024,
            temperature: 0.7,
            name: format!("ollama:{model}"),
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the generation cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// JSON body for a chat request.
    #[must_use]
    pub fn request_body(&self, messages: &[Message]) -> Value {
        json!({
            "model": self.model,
            "messages": wire_messages(messages),
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            }
        })
    }

    /// Pull the reply text out of a chat response.
    ///
    /// # Errors
    /// Returns `LlmError::MalformedResponse` when `message.content` is missing.
    pub fn parse_response(json: &Value) -> Result<String, LlmError> {
        json["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse(format!("no message.content in {json}")))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %self.model, messages = messages.len(), "calling Ollama");
        let request = self.http.post(&url).json(&self.request_body(messages));
        let json = post_json(request, self.timeout, "ollama").await?;
        Self::parse_response(&json)
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

/// Hosted model behind an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
    name: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// Create a provider for `model` at `base_url` (e.g. `https://api.openai.com`).
    #[must_use]
    pub fn new(base_url: &str, api_key: impl Into<String>, model: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.to_string(),
            timeout: Duration::from_secs(30),
            max_tokens: 1024,
            temperature: 0.7,
            name: format!("openai:{model}"),
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the generation cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// JSON body for a chat completion request.
    #[must_use]
    pub fn request_body(&self, messages: &[Message]) -> Value {
        json!({
            "model": self.model,
            "messages": wire_messages(messages),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }

    /// Pull the reply text out of a chat completion.
    ///
    /// # Errors
    /// Returns `LlmError::MalformedResponse` when `choices[0].message.content` is missing.
    pub fn parse_response(json: &Value) -> Result<String, LlmError> {
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::MalformedResponse(format!("no choices[0].message.content in {json}"))
            })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, messages = messages.len(), "calling OpenAI-compatible API");
        let request = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages));
        let json = post_json(request, self.timeout, "openai").await?;
        Self::parse_response(&json)
    }
}

// ---------------------------------------------------------------------------
// None
// ---------------------------------------------------------------------------

/// Provider for `kind = "none"`: every call fails as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProvider;

#[async_trait]
impl Provider for UnavailableProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn generate(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::Unavailable("No LLM provider configured".into()))
    }
}
