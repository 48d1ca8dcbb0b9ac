//! History condensation: scoring, selection, compression, and the cycle.
//!
//! A condensation cycle is built from four layers, applied in order:
//!
//! 1. **[`scorer`]** — a pure importance heuristic. Each candidate event gets
//!    a score in `[0, 1]` from its kind, keyword content, and age.
//!
//! 2. **[`selector`]** — size arithmetic. Partitions the view into a kept
//!    head, a kept tail, and a removable middle, then picks the cheapest
//!    contiguous runs to delete until the target size is met.
//!
//! 3. **[`compressor`]** — turns one removed run into a single structured
//!    summary event via an LLM call. The only I/O in the crate.
//!
//! 4. **[`fallback`]** — a deterministic, LLM-free compressor that steps in
//!    per run whenever the LLM path times out, is rate limited, or returns
//!    something unusable. Total: it cannot fail.
//!
//! [`truncate`] clamps per-event content before it reaches the scorer or a
//! prompt, and clamps compressor output, so cycle cost is bounded regardless
//! of how large individual events are.
//!
//! [`condenser::Condenser`] drives the whole cycle and is the type most
//! callers want; the layers are public for reuse and tuning.

pub mod compressor;
pub mod condenser;
pub mod fallback;
pub mod scorer;
pub mod selector;
pub mod truncate;

// Re-export commonly used items at the module level.
pub use compressor::{CompressionError, CompressionReason, CompressorConfig, SummaryCompressor};
pub use condenser::Condenser;
pub use scorer::{ImportanceScorer, KeywordSets};
pub use selector::{RemovalPlan, RemovalRun};
