//! Bundled one-shot completion client for OpenRouter-compatible endpoints.
//!
//! A minimal chat-completions POST: system prompt, user prompt, one choice
//! back. No streaming, no tool calls, no retries. Retries and auth policy
//! belong to the caller; this client just makes the request and reports
//! failures as classifiable strings (see [`super::errors`]).

use super::{Completer, Completion, CompletionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model when a request names none.
pub const DEFAULT_MODEL: &str = "z-ai/glm-5";

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct RawResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<RawError>,
    #[serde(default)]
    usage: Option<RawUsage>,
}

#[derive(Deserialize)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize)]
struct RawMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct RawError {
    message: String,
}

#[derive(Deserialize)]
struct RawUsage {
    total_tokens: Option<u32>,
}

/// Async HTTP client for one-shot completions.
pub struct OneShotClient {
    client: reqwest::Client,
    api_key: String,
    referer: String,
    title: String,
    default_model: String,
}

impl OneShotClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/recap-rs", "recap-rs")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("recap-rs/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
            default_model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Override the model used when a request names none.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[async_trait]
impl Completer for OneShotClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, String> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = WireRequest {
            model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            "completion request: model={}, prompt={} chars, max_tokens={}",
            model,
            request.prompt.len(),
            request.max_tokens,
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "completion response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("completion API HTTP {status}: {text}"));
        }

        let parsed: RawResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(err) = parsed.error {
            return Err(format!("completion API error: {}", err.message));
        }

        let total_tokens = parsed.usage.and_then(|u| u.total_tokens);
        if let Some(tokens) = total_tokens {
            trace!("completion used {tokens} tokens");
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content);

        match content {
            Some(text) => Ok(Completion { text, total_tokens }),
            None => Err("completion API returned no choices".to_string()),
        }
    }
}
