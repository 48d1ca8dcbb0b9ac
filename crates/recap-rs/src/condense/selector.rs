//! Retention selection: which contiguous runs of events get replaced.
//!
//! The view is partitioned into three zones. The first `keep_first` events
//! (system prompt, original task) and the most recent events are kept
//! verbatim; only the middle is a removal candidate. Within the middle,
//! events are removed cheapest-first by importance score, and adjacent
//! removals merge into contiguous runs so that each run costs exactly one
//! summary slot in the output.
//!
//! Selection is CPU-bound and synchronous; the plan it produces is handed to
//! the compressors, which do the I/O.

use crate::condense::scorer::ImportanceScorer;
use crate::condense::truncate::truncate;
use crate::config::CondenserConfig;
use crate::{Event, View};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// A maximal contiguous run of middle events selected for replacement.
///
/// Indices are positions in the original view; `end` is exclusive.
#[derive(Debug, Clone)]
pub struct RemovalRun {
    pub start: usize,
    pub end: usize,
    pub events: Vec<Event>,
}

impl RemovalRun {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Id for the summary event that replaces this run: the first removed
    /// event's id. Unique (the original holder is gone) and ordered between
    /// the surviving neighbors.
    pub fn summary_id(&self) -> u64 {
        self.events[0].id
    }

    /// Timestamp for the summary event: the midpoint of the run. Bounded by
    /// the run's endpoints, so view timestamps stay monotonic.
    pub fn midpoint_timestamp(&self) -> DateTime<Utc> {
        let first = self.events[0].timestamp;
        let last = self.events[self.events.len() - 1].timestamp;
        first + (last - first) / 2
    }

    /// Total content characters across the run (for compression ratio).
    pub fn total_chars(&self) -> usize {
        self.events.iter().map(Event::content_len).sum()
    }
}

/// The removal plan for one condensation cycle.
#[derive(Debug, Clone)]
pub struct RemovalPlan {
    /// Runs in chronological order. Empty means the cycle is a no-op.
    pub runs: Vec<RemovalRun>,
    /// The size the view is being reduced toward.
    pub target_size: usize,
}

impl RemovalPlan {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Total number of events slated for removal.
    pub fn events_to_remove(&self) -> usize {
        self.runs.iter().map(RemovalRun::len).sum()
    }
}

/// Whether the view has outgrown its limit.
pub fn should_condense(view: &View, max_size: usize) -> bool {
    view.len() > max_size
}

/// Compute the removal plan for a view.
///
/// Returns an empty plan when the view already fits the target, when there
/// is no removable middle, or when condensation could not strictly reduce
/// the view (reported as a configuration warning, not attempted).
pub fn select(
    view: &View,
    config: &CondenserConfig,
    scorer: &ImportanceScorer,
    now: DateTime<Utc>,
) -> RemovalPlan {
    let target_size = config.target_size();
    let empty = RemovalPlan {
        runs: Vec::new(),
        target_size,
    };

    if target_size >= view.len() {
        // Condensation must strictly reduce size or it is a no-op.
        warn!(
            "condensation target ({target_size}) does not undercut view size ({}); \
             check max_size / max_compression_ratio",
            view.len()
        );
        return empty;
    }

    let keep_first = config.keep_first.min(view.len());
    // One output slot is reserved for a summary event.
    let tail_len = target_size.saturating_sub(keep_first + 1);
    let tail_start = view.len() - tail_len.min(view.len());
    if tail_start <= keep_first {
        return empty;
    }

    let middle = &view.events()[keep_first..tail_start];

    // Score the removable middle. Already-condensed summaries are never
    // candidates: forgetting a summary forgets everything it stands for.
    let mut candidates: Vec<Candidate> = middle
        .iter()
        .enumerate()
        .filter(|(_, event)| !event.is_summary())
        .map(|(offset, event)| {
            let score = if config.enable_semantic_analysis {
                let content = truncate(&event.content, config.max_event_length);
                scorer.score_content(event.kind, event.timestamp, &content, now)
            } else {
                // Pure recency: equal scores make the timestamp tie-break
                // below degenerate to oldest-first removal.
                0.0
            };
            Candidate {
                offset,
                score,
                timestamp: event.timestamp,
            }
        })
        .collect();

    // Cheapest first; among equals, forget the oldest.
    candidates.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    // Mark removals until the projected output size meets the target. Each
    // maximal run of removed events is replaced by one summary, so marking
    // an event adjacent to an existing run is strictly cheaper than opening
    // a new run.
    let head_len = keep_first;
    let middle_len = middle.len();
    let mut removed = vec![false; middle_len];
    let mut removed_count = 0usize;
    let mut run_count = 0usize;

    let projected = |removed_count: usize, run_count: usize| {
        head_len + (middle_len - removed_count) + tail_len + run_count
    };

    for candidate in &candidates {
        if projected(removed_count, run_count) <= target_size {
            break;
        }
        let i = candidate.offset;
        removed[i] = true;
        removed_count += 1;
        let left = i > 0 && removed[i - 1];
        let right = i + 1 < middle_len && removed[i + 1];
        // New run, run extension, or bridge between two runs.
        run_count = run_count + 1 - (left as usize + right as usize);
    }

    if projected(removed_count, run_count) > target_size {
        debug!(
            "removal candidates exhausted at projected size {} (target {target_size})",
            projected(removed_count, run_count)
        );
    }

    if removed_count == 0 {
        return empty;
    }

    // Recover chronological order: maximal runs of removed middle events.
    let mut runs = Vec::new();
    let mut i = 0;
    while i < middle_len {
        if removed[i] {
            let start = i;
            while i < middle_len && removed[i] {
                i += 1;
            }
            runs.push(RemovalRun {
                start: keep_first + start,
                end: keep_first + i,
                events: middle[start..i].to_vec(),
            });
        } else {
            i += 1;
        }
    }

    debug!(
        "removal plan: {} events across {} run(s), view {} -> target {target_size}",
        removed_count,
        runs.len(),
        view.len()
    );

    RemovalPlan { runs, target_size }
}

struct Candidate {
    offset: usize,
    score: f64,
    timestamp: DateTime<Utc>,
}
