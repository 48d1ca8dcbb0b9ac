//! The LLM seam: a narrow completion interface plus a bundled HTTP client.
//!
//! The condenser's only I/O is a single prompt-in, text-out completion call
//! per removal run. Everything behind that call is a collaborator concern:
//! retries, auth, token accounting, and model selection policy all live with
//! whoever implements [`Completer`]. This module provides:
//!
//! - [`Completer`] — the trait the condenser consumes. One async method,
//!   string errors, no retry semantics.
//! - [`OneShotClient`](client::OneShotClient) — a reqwest-backed
//!   implementation for OpenRouter-compatible chat completion endpoints.
//! - [`errors`] — string-level classification of failures into the buckets
//!   the compressor's error taxonomy needs (timeout, rate limit, transport).

pub mod client;
pub mod errors;

use async_trait::async_trait;

// Re-export commonly used items at the module level.
pub use client::OneShotClient;

/// A single completion request.
///
/// `model: None` lets the implementation pick its default; the condenser
/// forwards the model named in its compressor config when one is set.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (compression instructions).
    pub system: String,
    /// User prompt (the events to compress).
    pub prompt: String,
    /// Maximum tokens for the response.
    pub max_tokens: u32,
    /// Sampling temperature. Summarization wants it low.
    pub temperature: f32,
    /// Model override, if any.
    pub model: Option<String>,
}

/// A successful completion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The response text.
    pub text: String,
    /// Total tokens reported by the API, when available. Feeds the
    /// `tokens_used` field of compression metrics.
    pub total_tokens: Option<u32>,
}

/// One-shot prompt-in, text-out completion capability.
///
/// Implementations should surface failures as descriptive strings including
/// any HTTP status (`"HTTP 429: ..."`), so [`errors`] can classify them.
/// Cancellation safety is required: the condenser drops the future when a
/// run misses its deadline.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, String>;
}
