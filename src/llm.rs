//! Shared chat-completion client for the query rewriter and memory compactor.
//!
//! The client is constructed once at startup from [`LlmConfig`] and shared
//! process-wide; [`LlmClient::from_config`] returns `None` when no API key is
//! configured, which is the signal for both consumers to use their
//! deterministic fallbacks (lexicon-only rewriting, fallback summaries).
//!
//! Calls are bounded by the configured per-call timeout (default 10 s) and
//! are explicitly non-deterministic; callers that need reproducibility run
//! without a key.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// One chat-completion invocation.
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

pub struct LlmClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl LlmClient {
    /// Build a client from config, or `None` when no API key is set.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build llm client: {e}")))?;

        Ok(Some(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }))
    }

    /// Send one chat request and return the assistant's text.
    ///
    /// # Errors
    ///
    /// `Transient` for network/timeout/5xx failures, `Llm` when the API
    /// answers but the response carries no usable text.
    pub async fn chat(&self, request: ChatRequest<'_>) -> Result<String> {
        let body = WireRequest {
            model: request.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: request.system,
                },
                WireMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(Error::Transient(format!("llm {status}: {message}")));
            }
            return Err(Error::Llm(format!("llm {status}: {message}")));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("invalid llm response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Llm("empty llm response".to_string()));
        }
        Ok(text)
    }
}
