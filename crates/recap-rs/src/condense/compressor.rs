//! LLM-backed compression of one removal run into a structured summary.
//!
//! Each removed run becomes a single synthetic event whose content is a
//! five-section text block: task context, key progress, technical state,
//! pending items, key findings. The sections give downstream consumers a
//! stable shape to parse and give the model a checklist that resists
//! rambling.
//!
//! One completion call per run, under a per-run timeout. Failures are
//! classified into [`CompressionError`] and absorbed by the condenser, which
//! falls back to the rule-based compressor for that run only.

use crate::api::{self, Completer, CompletionRequest};
use crate::condense::selector::RemovalRun;
use crate::condense::truncate::truncate;
use crate::Event;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The five section labels a summary must carry. A response containing none
/// of them is treated as malformed.
pub const SECTION_LABELS: [&str; 5] = [
    "Task context",
    "Key progress",
    "Technical state",
    "Pending items",
    "Key findings",
];

/// System prompt for the compression call. Instructs the model to produce
/// the five labeled sections and nothing else.
const COMPRESSION_PROMPT: &str = "\
You are a conversation compression assistant. Compress the following agent \
history events while preserving task-critical information.

Strategy:
1. Keep key information: error states, successful results, user instructions, important decisions.
2. Compress redundant content: repeated operations, similar outputs, verbose logs.
3. Merge similar operations: same-type file edits, similar query results.
4. Keep final state: task completion status, current values, important intermediate steps.

Respond with exactly five labeled sections:
Task context: (one-line description of the user's goal)
Key progress: (important actions and their outcomes)
Technical state: (code, configuration, and system state)
Pending items: (unfinished work and open problems)
Key findings: (error messages, debugging results, key observations)

Example:
Task context: Fix the floating point formatting bug in the FITS writer
Key progress: Rewrote mod_float() in card.py, unit tests pass
Technical state: str(val) replaces the .16G format string, full test suite green
Pending items: Open the pull request, update the changelog
Key findings: The old format string lost precision on round-trip";

// ── Error taxonomy ─────────────────────────────────────────────────

/// Why a compression call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionReason {
    /// The call exceeded its per-run timeout or the cycle deadline.
    Timeout,
    /// The endpoint rate-limited the call.
    RateLimited,
    /// Empty response, or a response carrying none of the section labels.
    MalformedResponse,
    /// Network or server failure.
    TransportFailure,
}

/// A failed compression attempt for one run. Local to that run; the
/// condenser recovers with the rule-based fallback and never surfaces this
/// to callers.
#[derive(Debug, Clone)]
pub struct CompressionError {
    pub reason: CompressionReason,
    pub detail: String,
}

impl CompressionError {
    fn new(reason: CompressionReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Classify a transport-level error string from the [`Completer`] seam.
    fn from_transport(error: String) -> Self {
        let reason = if api::errors::is_rate_limit_error(&error) {
            CompressionReason::RateLimited
        } else if api::errors::is_timeout_error(&error) {
            CompressionReason::Timeout
        } else {
            CompressionReason::TransportFailure
        };
        Self::new(reason, error)
    }
}

impl std::fmt::Display for CompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self.reason {
            CompressionReason::Timeout => "timeout",
            CompressionReason::RateLimited => "rate limited",
            CompressionReason::MalformedResponse => "malformed response",
            CompressionReason::TransportFailure => "transport failure",
        };
        write!(f, "compression failed ({reason}): {}", self.detail)
    }
}

impl std::error::Error for CompressionError {}

// ── Config ─────────────────────────────────────────────────────────

/// Configuration for the LLM compression path.
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Model for compression calls (cheaper than the main model, usually).
    /// `None` lets the completer pick its default.
    pub model: Option<String>,
    /// Maximum tokens for the summary response.
    pub max_summary_tokens: u32,
    /// Sampling temperature for the compression call.
    pub temperature: f32,
    /// Per-run timeout for one compression call.
    pub run_timeout: Duration,
    /// Overall deadline for one condensation cycle. Runs still unresolved at
    /// the deadline fall back to rule-based compression.
    pub cycle_deadline: Duration,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_summary_tokens: 1024,
            temperature: 0.3,
            run_timeout: Duration::from_secs(30),
            cycle_deadline: Duration::from_secs(120),
        }
    }
}

// ── Compressor ─────────────────────────────────────────────────────

/// A successfully compressed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The synthetic summary event replacing the run.
    pub event: Event,
    /// Tokens the completion reported, for metrics.
    pub tokens_used: Option<u32>,
}

/// LLM-backed run compressor.
pub struct SummaryCompressor<C> {
    completer: Arc<C>,
    config: CompressorConfig,
    max_event_length: usize,
}

impl<C: Completer> SummaryCompressor<C> {
    pub fn new(completer: Arc<C>, config: CompressorConfig, max_event_length: usize) -> Self {
        Self {
            completer,
            config,
            max_event_length,
        }
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Build the (system, user) prompt pair for a run.
    ///
    /// Event content is truncated per the event-length budget before it
    /// enters the prompt, so prompt size is bounded by the run length.
    pub fn build_compression_request(&self, run: &RemovalRun) -> (String, String) {
        let mut user = String::from("<events to compress>\n");
        for event in &run.events {
            let content = truncate(&event.content, self.max_event_length);
            let _ = writeln!(user, "[event {} | {}] {}\n", event.id, event.kind.label(), content);
        }
        user.push_str("</events to compress>\n\n");
        user.push_str(
            "Produce the five sections now, focusing on task progress and technical state.",
        );
        (COMPRESSION_PROMPT.to_string(), user)
    }

    /// Compress one run into a summary event.
    ///
    /// Exactly one completion call, bounded by the per-run timeout. Any
    /// failure is classified; the caller decides what to do with it (the
    /// condenser falls back).
    pub async fn compress(&self, run: &RemovalRun) -> Result<RunSummary, CompressionError> {
        let (system, prompt) = self.build_compression_request(run);
        let request = CompletionRequest {
            system,
            prompt,
            max_tokens: self.config.max_summary_tokens,
            temperature: self.config.temperature,
            model: self.config.model.clone(),
        };

        let outcome = tokio::time::timeout(self.config.run_timeout, self.completer.complete(request))
            .await
            .map_err(|_| {
                CompressionError::new(
                    CompressionReason::Timeout,
                    format!("run compression exceeded {:?}", self.config.run_timeout),
                )
            })?;

        let completion = outcome.map_err(CompressionError::from_transport)?;

        let text = completion.text.trim();
        if text.is_empty() {
            return Err(CompressionError::new(
                CompressionReason::MalformedResponse,
                "empty completion",
            ));
        }
        if !has_section_labels(text) {
            return Err(CompressionError::new(
                CompressionReason::MalformedResponse,
                "response carries none of the expected section labels",
            ));
        }

        debug!(
            "compressed run of {} events into {} chars",
            run.len(),
            text.chars().count()
        );

        Ok(RunSummary {
            event: summary_event_for_run(run, text, self.max_event_length),
            tokens_used: completion.total_tokens,
        })
    }
}

/// Whether the text carries at least one of the five section labels.
pub(crate) fn has_section_labels(text: &str) -> bool {
    let lower = text.to_lowercase();
    SECTION_LABELS
        .iter()
        .any(|label| lower.contains(&label.to_lowercase()))
}

/// Wrap summary text into the synthetic event replacing `run`.
///
/// The output passes through the truncation guard independently of the
/// input truncation, so summary size is bounded even if the model ignores
/// its token limit.
pub(crate) fn summary_event_for_run(run: &RemovalRun, text: &str, max_event_length: usize) -> Event {
    let content = truncate(text, max_event_length).into_owned();
    Event::summary(run.summary_id(), run.midpoint_timestamp(), content)
}
