//! Convenience re-exports for common `recap-rs` types.
//!
//! Meant to be glob-imported when wiring a condenser into an agent loop:
//!
//! ```ignore
//! use recap_rs::prelude::*;
//! ```
//!
//! This pulls in the event model, the [`Condenser`] and its config, the
//! [`Completer`] seam with the bundled client, and the event sinks.
//! Specialized types (removal plans, keyword tables, compression errors)
//! are intentionally excluded; import those from their modules directly
//! when tuning the internals.

// ── Event model ─────────────────────────────────────────────────────
pub use crate::{ActionKind, Event, EventKind, View};

// ── Condensation ────────────────────────────────────────────────────
pub use crate::condense::{Condenser, CompressorConfig};
pub use crate::config::{CondenserConfig, ConfigError};

// ── LLM seam ────────────────────────────────────────────────────────
pub use crate::api::{Completer, Completion, CompletionRequest, OneShotClient};

// ── Observability ───────────────────────────────────────────────────
pub use crate::events::{
    CompressionMetrics, CondenseEvent, EventSink, FnSink, LoggingSink, NoopSink, SummarySource,
};
