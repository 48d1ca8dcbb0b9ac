//! The condensation cycle: decide, select, compress, splice, report.
//!
//! A [`Condenser`] is session-scoped. It owns the configuration, the scorer,
//! the compressor, and a cycle lock that serializes condensation for its
//! session; separate sessions use separate condensers and share nothing
//! mutable. One cycle walks the state machine
//!
//! ```text
//! Idle -> Evaluating -> Compressing -> Committed -> Idle
//!                            \-> FallingBack (per run) -/
//! ```
//!
//! Removal runs compress concurrently, each bounded by the per-run timeout
//! and the cycle-wide deadline. A run that misses either, gets rate limited,
//! or returns an unusable response falls back to rule-based compression for
//! that run only. The new view is assembled only after every run has
//! resolved; partial cycles are never committed. Condensation therefore
//! cannot fail: the only fallible operation on this type is construction.

use crate::api::Completer;
use crate::condense::compressor::SummaryCompressor;
use crate::condense::fallback;
use crate::condense::scorer::{ImportanceScorer, KeywordSets};
use crate::condense::selector::{self, RemovalPlan, RemovalRun};
use crate::config::{CondenserConfig, ConfigError};
use crate::events::{
    CompressionMetrics, CondenseEvent, CyclePhase, EventSink, NoopSink, SummarySource,
};
use crate::{Event, View};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Session-scoped history condenser.
pub struct Condenser<C> {
    config: CondenserConfig,
    scorer: ImportanceScorer,
    compressor: SummaryCompressor<C>,
    sink: Arc<dyn EventSink>,
    /// Serializes condensation cycles for this session: both ends of a
    /// cycle read and replace the same view.
    cycle_lock: tokio::sync::Mutex<()>,
}

impl<C: Completer> Condenser<C> {
    /// Build a condenser. The only fallible operation on this type:
    /// configuration is validated here, never during a cycle.
    pub fn new(config: CondenserConfig, completer: Arc<C>) -> Result<Self, ConfigError> {
        config.validate()?;
        let compressor = SummaryCompressor::new(
            completer,
            config.compressor.clone(),
            config.max_event_length,
        );
        Ok(Self {
            config,
            scorer: ImportanceScorer::new(KeywordSets::default()),
            compressor,
            sink: Arc::new(NoopSink),
            cycle_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Attach an event sink for metrics and cycle observation.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use custom keyword tables for scoring and fallback classification.
    pub fn with_keywords(mut self, keywords: KeywordSets) -> Self {
        self.scorer = ImportanceScorer::new(keywords);
        self
    }

    pub fn config(&self) -> &CondenserConfig {
        &self.config
    }

    /// Whether the view has outgrown `max_size`.
    pub fn should_condense(&self, view: &View) -> bool {
        selector::should_condense(view, self.config.max_size)
    }

    /// Condense only if the view has outgrown its limit; otherwise return
    /// it unchanged. This is the call agent loops make every turn.
    pub async fn maybe_condense(&self, view: View) -> View {
        if !self.should_condense(&view) {
            return view;
        }
        self.condense(view).await
    }

    /// Run one condensation cycle unconditionally.
    ///
    /// Still a no-op (view returned unchanged) when the removal plan is
    /// empty: condensation must strictly reduce the view or not happen.
    pub async fn condense(&self, view: View) -> View {
        let _cycle = self.cycle_lock.lock().await;
        let started = Instant::now();

        // ── Evaluating ──
        self.enter(CyclePhase::Evaluating);
        let now = Utc::now();
        let plan = selector::select(&view, &self.config, &self.scorer, now);
        self.sink.on_event(&CondenseEvent::CycleStart {
            view_len: view.len(),
            target_size: plan.target_size,
        });

        if plan.is_empty() {
            if view.len() <= plan.target_size {
                // Condensation cannot strictly reduce this view: a
                // configuration problem, not a runtime failure.
                let message = format!(
                    "target size {} does not undercut the {}-event view; \
                     check max_size / max_compression_ratio",
                    plan.target_size,
                    view.len()
                );
                self.sink
                    .on_event(&CondenseEvent::ConfigWarning { message: &message });
            } else {
                self.sink
                    .on_event(&CondenseEvent::PlanEmpty { view_len: view.len() });
            }
            self.enter(CyclePhase::Idle);
            return view;
        }

        // ── Compressing (FallingBack per run on failure) ──
        self.enter(CyclePhase::Compressing);
        let deadline = tokio::time::Instant::now() + self.config.compressor.cycle_deadline;
        let summaries = join_all(
            plan.runs
                .iter()
                .enumerate()
                .map(|(index, run)| self.compress_run(index, run, deadline)),
        )
        .await;

        // ── Committed ──
        let removed_chars: usize = plan.runs.iter().map(|r| r.total_chars()).sum();
        let summary_chars: usize = summaries.iter().map(|(e, _)| e.content_len()).sum();
        let tokens_used: u64 = summaries
            .iter()
            .filter_map(|(_, outcome)| outcome.tokens)
            .map(u64::from)
            .sum();
        let fallback_runs = summaries
            .iter()
            .filter(|(_, outcome)| outcome.source == SummarySource::Fallback)
            .count();

        let new_view = splice(&view, &plan, summaries.into_iter().map(|(e, _)| e));

        let metrics = CompressionMetrics {
            events_compressed: plan.events_to_remove(),
            compression_ratio: if removed_chars > 0 {
                summary_chars as f64 / removed_chars as f64
            } else {
                0.0
            },
            processing_time_ms: started.elapsed().as_millis() as u64,
            tokens_used,
            fallback_runs,
        };
        debug!(
            "cycle committed: {} -> {} events, {} run(s), {} fallback",
            view.len(),
            new_view.len(),
            plan.runs.len(),
            fallback_runs,
        );
        self.enter(CyclePhase::Committed);
        self.sink
            .on_event(&CondenseEvent::Committed { metrics: &metrics });
        self.enter(CyclePhase::Idle);

        new_view
    }

    fn enter(&self, phase: CyclePhase) {
        self.sink.on_event(&CondenseEvent::PhaseChanged { phase });
    }

    /// Resolve one removal run into a summary event, falling back on any
    /// compression failure or on the cycle deadline.
    async fn compress_run(
        &self,
        index: usize,
        run: &RemovalRun,
        deadline: tokio::time::Instant,
    ) -> (Event, RunOutcome) {
        let attempt = tokio::time::timeout_at(deadline, self.compressor.compress(run)).await;

        let (event, outcome) = match attempt {
            Ok(Ok(summary)) => (
                summary.event,
                RunOutcome {
                    source: SummarySource::Llm,
                    tokens: summary.tokens_used,
                },
            ),
            Ok(Err(error)) => {
                warn!("run {index}: {error}; falling back to rule-based compression");
                self.enter(CyclePhase::FallingBack);
                (
                    fallback::fallback_compress(
                        run,
                        self.scorer.keywords(),
                        self.config.max_event_length,
                    ),
                    RunOutcome::fallback(),
                )
            }
            Err(_) => {
                warn!("run {index}: cycle deadline reached; falling back to rule-based compression");
                self.enter(CyclePhase::FallingBack);
                (
                    fallback::fallback_compress(
                        run,
                        self.scorer.keywords(),
                        self.config.max_event_length,
                    ),
                    RunOutcome::fallback(),
                )
            }
        };

        self.sink.on_event(&CondenseEvent::RunCompressed {
            run_index: index,
            events: run.len(),
            source: outcome.source,
        });

        (event, outcome)
    }
}

struct RunOutcome {
    source: SummarySource,
    tokens: Option<u32>,
}

impl RunOutcome {
    fn fallback() -> Self {
        Self {
            source: SummarySource::Fallback,
            tokens: None,
        }
    }
}

/// Assemble the new view: head and tail verbatim, each removal run replaced
/// in place by its summary event.
fn splice(view: &View, plan: &RemovalPlan, summaries: impl Iterator<Item = Event>) -> View {
    let events = view.events();
    let mut out = Vec::with_capacity(view.len() - plan.events_to_remove() + plan.runs.len());
    let mut cursor = 0;

    for (run, summary) in plan.runs.iter().zip(summaries) {
        out.extend_from_slice(&events[cursor..run.start]);
        out.push(summary);
        cursor = run.end;
    }
    out.extend_from_slice(&events[cursor..]);

    View::from_events(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Completion, CompletionRequest};
    use crate::condense::compressor::CompressorConfig;
    use crate::events::FnSink;
    use crate::{ActionKind, EventKind};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn bland_view(n: usize) -> View {
        View::from_events(
            (0..n)
                .map(|i| Event::observation(i as u64, ts(i as i64), format!("step {i}")))
                .collect(),
        )
    }

    const GOOD_SUMMARY: &str = "Task context: test session\n\
        Key progress: steps executed\n\
        Technical state: stable\n\
        Pending items: none\n\
        Key findings: none";

    /// Always succeeds with a well-formed five-section summary.
    struct FixedCompleter;

    #[async_trait]
    impl Completer for FixedCompleter {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, String> {
            Ok(Completion {
                text: GOOD_SUMMARY.to_string(),
                total_tokens: Some(100),
            })
        }
    }

    /// Always fails at the transport level.
    struct BrokenCompleter;

    #[async_trait]
    impl Completer for BrokenCompleter {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, String> {
            Err("completion API HTTP 503: unavailable".to_string())
        }
    }

    /// Hangs forever when the prompt mentions the marker event id.
    struct SelectivelySlowCompleter {
        slow_marker: String,
    }

    #[async_trait]
    impl Completer for SelectivelySlowCompleter {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion, String> {
            if request.prompt.contains(&self.slow_marker) {
                std::future::pending::<()>().await;
            }
            Ok(Completion {
                text: GOOD_SUMMARY.to_string(),
                total_tokens: Some(100),
            })
        }
    }

    fn condenser_with<C: Completer>(
        completer: C,
        config: CondenserConfig,
    ) -> Condenser<C> {
        Condenser::new(config, Arc::new(completer)).unwrap()
    }

    fn scenario_config() -> CondenserConfig {
        CondenserConfig::default()
            .with_max_size(100)
            .with_keep_first(1)
            .with_max_compression_ratio(0.3)
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = CondenserConfig::default()
            .with_max_size(10)
            .with_keep_first(5);
        assert!(Condenser::new(config, Arc::new(FixedCompleter)).is_err());
    }

    #[tokio::test]
    async fn view_within_limit_is_untouched() {
        let condenser = condenser_with(FixedCompleter, scenario_config());
        let view = bland_view(100); // len == max_size, not over it
        let out = condenser.maybe_condense(view.clone()).await;
        assert_eq!(out, view);
    }

    #[tokio::test]
    async fn worked_example_end_to_end() {
        // 100 events, max_size 100, keep_first 1, ratio 0.3: forced
        // condensation lands on exactly 30 events with head, summary, and
        // the 28 most recent events verbatim.
        let condenser = condenser_with(FixedCompleter, scenario_config());
        let view = bland_view(100);
        let out = condenser.condense(view.clone()).await;

        assert_eq!(out.len(), 30);
        assert_eq!(out[0], view[0]);
        assert_eq!(out[1].kind, EventKind::CondensationSummary);
        for i in 2..30 {
            assert_eq!(out[i], view[70 + i], "tail event {i} must be bit-identical");
        }
    }

    #[tokio::test]
    async fn size_bounds_hold_after_condensation() {
        let condenser = condenser_with(FixedCompleter, scenario_config());
        let out = condenser.condense(bland_view(150)).await;
        let config = condenser.config();
        assert!(out.len() <= config.target_size());
        assert!(out.len() >= config.keep_first + 1);
    }

    #[tokio::test]
    async fn transport_failure_falls_back_and_commits() {
        let metrics_seen = Arc::new(Mutex::new(Vec::new()));
        let sink_metrics = Arc::clone(&metrics_seen);
        let sink = FnSink::new(move |event: &CondenseEvent<'_>| {
            if let CondenseEvent::Committed { metrics } = event {
                sink_metrics.lock().unwrap().push((*metrics).clone());
            }
        });

        let condenser =
            condenser_with(BrokenCompleter, scenario_config()).with_sink(Arc::new(sink));
        let out = condenser.condense(bland_view(120)).await;

        assert_eq!(out.len(), 30);
        assert_eq!(out[1].kind, EventKind::CondensationSummary);
        assert!(out[1].content.contains("Technical state"));

        let metrics = metrics_seen.lock().unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].fallback_runs, 1);
        assert_eq!(metrics[0].tokens_used, 0);
        assert_eq!(metrics[0].events_compressed, 91);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_run_falls_back_while_other_run_uses_llm() {
        // Two removal runs, split by a protected summary event in the
        // middle. The completer hangs on the run containing event 3, so
        // that run falls back while the other commits its LLM summary.
        let mut events: Vec<Event> = (0..30)
            .map(|i| Event::observation(i as u64, ts(i as i64), format!("step {i}")))
            .collect();
        events[10] = Event::summary(10, ts(10), "Task context: earlier work");
        let view = View::from_events(events);

        let sources = Arc::new(Mutex::new(Vec::new()));
        let sink_sources = Arc::clone(&sources);
        let sink = FnSink::new(move |event: &CondenseEvent<'_>| {
            if let CondenseEvent::RunCompressed { source, .. } = event {
                sink_sources.lock().unwrap().push(*source);
            }
        });

        let config = CondenserConfig::default()
            .with_max_size(20)
            .with_keep_first(1)
            .with_max_compression_ratio(0.5)
            .with_compressor(CompressorConfig {
                run_timeout: Duration::from_millis(100),
                ..CompressorConfig::default()
            });
        let condenser = condenser_with(
            SelectivelySlowCompleter {
                slow_marker: "[event 3 ".to_string(),
            },
            config,
        )
        .with_sink(Arc::new(sink));

        let out = condenser.condense(view).await;

        // Both runs resolved; the protected summary survived between them.
        let summary_count = out
            .iter()
            .filter(|e| e.kind == EventKind::CondensationSummary)
            .count();
        assert_eq!(summary_count, 3); // 2 new + the protected one
        let seen = sources.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&SummarySource::Fallback));
        assert!(seen.contains(&SummarySource::Llm));
    }

    #[tokio::test]
    async fn cycle_walks_the_state_machine() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink_phases = Arc::clone(&phases);
        let sink = FnSink::new(move |event: &CondenseEvent<'_>| {
            if let CondenseEvent::PhaseChanged { phase } = event {
                sink_phases.lock().unwrap().push(*phase);
            }
        });
        let condenser =
            condenser_with(FixedCompleter, scenario_config()).with_sink(Arc::new(sink));
        condenser.condense(bland_view(120)).await;

        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                CyclePhase::Evaluating,
                CyclePhase::Compressing,
                CyclePhase::Committed,
                CyclePhase::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn semantic_analysis_off_still_condenses() {
        let config = scenario_config().with_semantic_analysis(false);
        let condenser = condenser_with(FixedCompleter, config);
        let view = bland_view(120);
        let out = condenser.condense(view.clone()).await;
        assert_eq!(out.len(), 30);
        // Head and the most recent tail survive; everything between is one
        // summary regardless of content.
        assert_eq!(out[0], view[0]);
        assert_eq!(out[29], view[119]);
    }

    #[tokio::test]
    async fn ids_and_timestamps_stay_monotonic() {
        let condenser = condenser_with(FixedCompleter, scenario_config());
        let out = condenser.condense(bland_view(150)).await;
        for pair in out.events().windows(2) {
            assert!(pair[0].id < pair[1].id);
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn no_strict_reduction_emits_config_warning() {
        // A forced cycle whose target cannot undercut the view must warn
        // and change nothing.
        let config = CondenserConfig::default()
            .with_max_size(10)
            .with_keep_first(1)
            .with_max_compression_ratio(1.0);
        let warned = Arc::new(AtomicUsize::new(0));
        let sink_warned = Arc::clone(&warned);
        let sink = FnSink::new(move |event: &CondenseEvent<'_>| {
            if matches!(event, CondenseEvent::ConfigWarning { .. }) {
                sink_warned.fetch_add(1, Ordering::SeqCst);
            }
        });
        let condenser = condenser_with(FixedCompleter, config).with_sink(Arc::new(sink));

        // target_size = max(floor(10 * 1.0), 3) = 10: a 10-event view cannot
        // strictly shrink, so the forced cycle warns and changes nothing.
        let view = bland_view(10);
        let out = condenser.condense(view.clone()).await;
        assert_eq!(out, view);
        assert_eq!(warned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_cycles_serialize_on_one_condenser() {
        let condenser = Arc::new(condenser_with(FixedCompleter, scenario_config()));
        let a = Arc::clone(&condenser);
        let b = Arc::clone(&condenser);
        let (out_a, out_b) = tokio::join!(
            a.condense(bland_view(150)),
            b.condense(bland_view(150)),
        );
        assert_eq!(out_a.len(), 30);
        assert_eq!(out_b.len(), 30);
    }

    #[tokio::test]
    async fn condensed_view_is_shape_identical() {
        // A condensed view round-trips through serde just like a raw one
        // and contains only ordinary events.
        let condenser = condenser_with(FixedCompleter, scenario_config());
        let out = condenser.condense(bland_view(120)).await;
        let json = serde_json::to_string(&out).unwrap();
        let back: View = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
    }

    #[tokio::test]
    async fn mixed_kind_view_condenses_cleanly() {
        let events: Vec<Event> = (0..60)
            .map(|i| match i % 4 {
                0 => Event::user_message(i as u64, ts(i as i64), "please continue"),
                1 => Event::action(i as u64, ts(i as i64), ActionKind::Command, "cargo check"),
                2 => Event::action(i as u64, ts(i as i64), ActionKind::Edit, "edited lib.rs"),
                _ => Event::observation(i as u64, ts(i as i64), "compiled successfully"),
            })
            .collect();
        let view = View::from_events(events);

        let config = CondenserConfig::default()
            .with_max_size(50)
            .with_keep_first(2)
            .with_max_compression_ratio(0.4);
        let condenser = condenser_with(FixedCompleter, config);
        let out = condenser.condense(view.clone()).await;

        assert_eq!(out.len(), condenser.config().target_size());
        assert_eq!(out[0], view[0]);
        assert_eq!(out[1], view[1]);
    }
}
