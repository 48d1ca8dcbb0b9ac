//! Cycle events, sinks, and compression metrics.
//!
//! The condenser communicates with callers through [`CondenseEvent`]
//! variants covering the lifecycle of a condensation cycle. Callers
//! implement [`EventSink`] to observe them for logging, dashboards, or
//! metrics pipelines. Delivery is fire-and-forget: sinks are observational,
//! never authoritative, and cannot influence the cycle.
//!
//! # Choosing a sink
//!
//! | Sink | Use case |
//! |------|----------|
//! | [`NoopSink`] | Tests or fire-and-forget runs |
//! | [`LoggingSink`] | Structured logging via `tracing` |
//! | [`FnSink`] | Quick closures for simple callbacks |
//! | Custom `impl EventSink` | Full control (metrics backends, dashboards) |

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ── Cycle state ────────────────────────────────────────────────────

/// Where a condensation cycle currently is.
///
/// `FallingBack` is per removal run: one run can be falling back while
/// another commits its LLM summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Evaluating,
    Compressing,
    FallingBack,
    Committed,
}

/// How a run's summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    /// The LLM compression path.
    Llm,
    /// The deterministic rule-based path.
    Fallback,
}

// ── Metrics ────────────────────────────────────────────────────────

/// Observational per-cycle metrics, handed to the sink after commit.
///
/// `fallback_runs` is the only place degraded-quality cycles are visible;
/// the committed view itself is shape-identical either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionMetrics {
    /// Events removed and replaced by summaries this cycle.
    pub events_compressed: usize,
    /// Summary chars over removed-event chars. Lower is tighter.
    pub compression_ratio: f64,
    /// Wall-clock duration of the cycle.
    pub processing_time_ms: u64,
    /// Tokens reported by the completion API, summed over LLM runs.
    pub tokens_used: u64,
    /// Runs that took the rule-based path instead of the LLM.
    pub fallback_runs: usize,
}

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted during a condensation cycle.
#[derive(Debug)]
pub enum CondenseEvent<'a> {
    /// The cycle moved to a new phase of its state machine.
    PhaseChanged { phase: CyclePhase },
    /// A cycle started: the view exceeded its limit (or condensation was
    /// forced) and a removal plan is being computed.
    CycleStart { view_len: usize, target_size: usize },
    /// The plan came back empty; the view is returned unchanged.
    PlanEmpty { view_len: usize },
    /// Condensation was triggered but could not strictly reduce the view.
    /// Points at a configuration problem, not a runtime failure.
    ConfigWarning { message: &'a str },
    /// One removal run resolved into a summary event.
    RunCompressed {
        run_index: usize,
        events: usize,
        source: SummarySource,
    },
    /// The new view was assembled and the cycle is complete.
    Committed { metrics: &'a CompressionMetrics },
}

/// Observer for condensation cycle events.
///
/// The default implementation ignores everything, so sinks only write the
/// arms they care about.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &CondenseEvent<'_>) {
        let _ = event;
    }
}

/// A sink that ignores all events.
pub struct NoopSink;
impl EventSink for NoopSink {}

/// A sink that logs events through `tracing`.
///
/// Cycle starts and commits log at info, per-run results at debug, and
/// configuration warnings at warn.
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn on_event(&self, event: &CondenseEvent<'_>) {
        match event {
            CondenseEvent::PhaseChanged { phase } => {
                debug!("condenser phase: {phase:?}");
            }
            CondenseEvent::CycleStart {
                view_len,
                target_size,
            } => {
                info!("condensation cycle: {view_len} events -> target {target_size}");
            }
            CondenseEvent::PlanEmpty { view_len } => {
                debug!("condensation no-op: nothing to remove from {view_len} events");
            }
            CondenseEvent::ConfigWarning { message } => {
                warn!("condensation config warning: {message}");
            }
            CondenseEvent::RunCompressed {
                run_index,
                events,
                source,
            } => {
                debug!("run {run_index}: {events} events compressed via {source:?}");
            }
            CondenseEvent::Committed { metrics } => {
                info!(
                    "condensation committed: {} events compressed, ratio {:.3}, \
                     {} ms, {} tokens, {} fallback run(s)",
                    metrics.events_compressed,
                    metrics.compression_ratio,
                    metrics.processing_time_ms,
                    metrics.tokens_used,
                    metrics.fallback_runs,
                );
            }
        }
    }
}

/// A sink backed by a closure.
///
/// ```ignore
/// let sink = FnSink::new(|event| {
///     if let CondenseEvent::Committed { metrics } = event {
///         push_to_dashboard(metrics);
///     }
/// });
/// ```
pub struct FnSink<F>(F)
where
    F: Fn(&CondenseEvent<'_>) + Send + Sync;

impl<F> FnSink<F>
where
    F: Fn(&CondenseEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventSink for FnSink<F>
where
    F: Fn(&CondenseEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &CondenseEvent<'_>) {
        (self.0)(event)
    }
}
