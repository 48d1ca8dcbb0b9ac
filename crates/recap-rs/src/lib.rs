//! Bounded conversation-history condensation for LLM agents.
//!
//! `recap-rs` keeps an agent's event history within a configurable size while
//! preserving the information most likely to matter for the task at hand. The
//! core abstraction is the [`Condenser`](condense::Condenser): given a
//! [`View`] (an ordered event history) that has grown past its limit, it
//! selects contiguous runs of low-importance events, replaces each run with a
//! single structured summary event, and returns the shorter view. Surviving
//! events are untouched; the output is shape-identical to the input.
//!
//! Summaries are produced by an LLM through the narrow
//! [`Completer`](api::Completer) seam. When the LLM call times out, is rate
//! limited, or returns garbage, a deterministic rule-based compressor takes
//! over for that run, so a condensation cycle never fails once the condenser
//! has been constructed.
//!
//! # Getting started
//!
//! ```ignore
//! use recap_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENROUTER_KEY")?;
//!     let client = Arc::new(OneShotClient::new(api_key)?);
//!
//!     let config = CondenserConfig::default()
//!         .with_max_size(200)
//!         .with_keep_first(2);
//!
//!     let condenser = Condenser::new(config, client)?
//!         .with_sink(Arc::new(LoggingSink));
//!
//!     // `view` is the agent's event history, produced upstream.
//!     let view = condenser.maybe_condense(view).await;
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Run a condensation cycle:** see [`Condenser`](condense::Condenser) and
//!   [`CondenserConfig`](config::CondenserConfig). Use
//!   [`maybe_condense()`](condense::Condenser::maybe_condense) in an agent
//!   loop; it is a no-op until the view exceeds `max_size`.
//!
//! - **Plug in an LLM:** implement [`Completer`](api::Completer), or use the
//!   bundled [`OneShotClient`](api::OneShotClient) for OpenRouter-compatible
//!   chat completion endpoints.
//!
//! - **Observe what happened:** implement [`EventSink`](events::EventSink) to
//!   receive [`CondenseEvent`](events::CondenseEvent)s, including the
//!   per-cycle [`CompressionMetrics`](events::CompressionMetrics). Use
//!   [`LoggingSink`](events::LoggingSink) for tracing-based logging.
//!
//! - **Tune the heuristics:** the importance scoring rules live in
//!   [`condense::scorer`], the size arithmetic in [`condense::selector`], and
//!   the per-event length clamp in [`condense::truncate`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`condense`] | Scorer, selector, compressors, and the [`Condenser`](condense::Condenser) cycle |
//! | [`api`] | [`Completer`](api::Completer) trait, bundled HTTP client, error classification |
//! | [`config`] | [`CondenserConfig`](config::CondenserConfig) with fail-fast validation |
//! | [`events`] | [`EventSink`](events::EventSink), cycle events, compression metrics |
//!
//! # Design principles
//!
//! 1. **Condensation never fails.** The only fallible operation is condenser
//!    construction. Every LLM failure inside a cycle is absorbed by the
//!    rule-based fallback; callers always get a valid view back.
//!
//! 2. **Surviving events are sacred.** The condenser removes contiguous runs
//!    and inserts one summary per run. It never reorders, edits, or truncates
//!    events that stay in the view.
//!
//! 3. **Scoring is pure.** Importance scores are a function of the event and
//!    a reference time, recomputed each cycle, never cached. The keyword
//!    tables are immutable configuration, not ambient state.
//!
//! 4. **One cycle per session at a time.** A condenser is session-scoped and
//!    serializes its own cycles; separate sessions use separate condensers
//!    and share nothing mutable.

pub mod api;
pub mod condense;
pub mod config;
pub mod events;
pub mod prelude;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Event model ────────────────────────────────────────────────────

/// What an [`EventKind::AgentAction`] did, for base-importance scoring.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// File creation or modification.
    Edit,
    /// Shell command execution.
    Command,
    /// Read-only browsing or searching.
    Browse,
    /// Anything else the agent did.
    Other,
}

/// The kind of a history event.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A message from the user.
    UserMessage,
    /// An action taken by the agent.
    AgentAction(ActionKind),
    /// The environment's response to an action.
    Observation,
    /// A synthetic summary inserted by a previous condensation cycle.
    CondensationSummary,
}

impl EventKind {
    /// Short label used in fallback summaries and logs.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::UserMessage => "user_message",
            EventKind::AgentAction(_) => "agent_action",
            EventKind::Observation => "observation",
            EventKind::CondensationSummary => "condensation_summary",
        }
    }
}

/// One turn of agent history.
///
/// Events are immutable once created and owned by the [`View`] that contains
/// them. Upstream producers guarantee unique, strictly increasing ids and
/// non-decreasing timestamps; the condenser preserves both.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub id: u64,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl Event {
    pub fn new(
        id: u64,
        kind: EventKind,
        timestamp: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            timestamp,
            content: content.into(),
        }
    }

    pub fn user_message(id: u64, timestamp: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self::new(id, EventKind::UserMessage, timestamp, content)
    }

    pub fn action(
        id: u64,
        timestamp: DateTime<Utc>,
        action: ActionKind,
        content: impl Into<String>,
    ) -> Self {
        Self::new(id, EventKind::AgentAction(action), timestamp, content)
    }

    pub fn observation(id: u64, timestamp: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self::new(id, EventKind::Observation, timestamp, content)
    }

    pub fn summary(id: u64, timestamp: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self::new(id, EventKind::CondensationSummary, timestamp, content)
    }

    /// Content length in characters (not bytes).
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Whether this event was produced by a previous condensation cycle.
    pub fn is_summary(&self) -> bool {
        self.kind == EventKind::CondensationSummary
    }
}

// ── View ───────────────────────────────────────────────────────────

/// An ordered, indexable event history.
///
/// Insertion order is chronological order is causal order. The condenser only
/// ever removes contiguous runs and inserts one summary event per removed
/// run; it never reorders or mutates surviving events.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct View {
    events: Vec<Event>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a view from an already-ordered event list.
    ///
    /// Debug builds assert the upstream ordering contract (strictly
    /// increasing ids, non-decreasing timestamps).
    pub fn from_events(events: Vec<Event>) -> Self {
        if cfg!(debug_assertions) {
            for pair in events.windows(2) {
                debug_assert!(pair[0].id < pair[1].id, "event ids must strictly increase");
                debug_assert!(
                    pair[0].timestamp <= pair[1].timestamp,
                    "event timestamps must be monotonic"
                );
            }
        }
        Self { events }
    }

    /// Append an event. The ordering contract is on the producer; debug
    /// builds assert it.
    pub fn push(&mut self, event: Event) {
        if let Some(last) = self.events.last() {
            debug_assert!(last.id < event.id, "event ids must strictly increase");
            debug_assert!(
                last.timestamp <= event.timestamp,
                "event timestamps must be monotonic"
            );
        }
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Total content characters across all events.
    pub fn total_chars(&self) -> usize {
        self.events.iter().map(Event::content_len).sum()
    }
}

impl From<Vec<Event>> for View {
    fn from(events: Vec<Event>) -> Self {
        Self::from_events(events)
    }
}

impl std::ops::Index<usize> for View {
    type Output = Event;

    fn index(&self, index: usize) -> &Event {
        &self.events[index]
    }
}

impl<'a> IntoIterator for &'a View {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for View {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn event_constructors() {
        let user = Event::user_message(1, ts(0), "hello");
        assert_eq!(user.kind, EventKind::UserMessage);
        assert_eq!(user.content, "hello");

        let action = Event::action(2, ts(1), ActionKind::Edit, "edited src/lib.rs");
        assert_eq!(action.kind, EventKind::AgentAction(ActionKind::Edit));

        let obs = Event::observation(3, ts(2), "file written");
        assert_eq!(obs.kind, EventKind::Observation);
        assert!(!obs.is_summary());

        let summary = Event::summary(4, ts(3), "Task context: testing");
        assert!(summary.is_summary());
    }

    #[test]
    fn content_len_counts_chars_not_bytes() {
        let event = Event::observation(1, ts(0), "héllo wörld");
        assert_eq!(event.content_len(), 11);
        assert!(event.content.len() > 11);
    }

    #[test]
    fn view_indexing_and_iteration() {
        let view = View::from_events(vec![
            Event::user_message(1, ts(0), "a"),
            Event::observation(2, ts(1), "b"),
        ]);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id, 1);
        assert_eq!(view.iter().count(), 2);
        assert_eq!(view.total_chars(), 2);
    }

    #[test]
    fn kind_labels() {
        assert_eq!(EventKind::UserMessage.label(), "user_message");
        assert_eq!(
            EventKind::AgentAction(ActionKind::Command).label(),
            "agent_action"
        );
        assert_eq!(EventKind::CondensationSummary.label(), "condensation_summary");
    }

    #[test]
    fn event_roundtrips_through_serde() {
        let event = Event::action(7, ts(5), ActionKind::Command, "cargo fmt");
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
