//! Rule-based compression: the path that cannot fail.
//!
//! When the LLM path times out, gets rate limited, or returns garbage, the
//! condenser still owes the cycle a summary event for the run. This module
//! produces one from keyword classification and event-kind tallies alone: no
//! I/O, bounded output, total over every finite input including
//! empty-content events.
//!
//! Strictly worse than an LLM summary in fidelity. The five-section shape is
//! kept so downstream consumers parse both kinds the same way.

use crate::condense::compressor;
use crate::condense::scorer::KeywordSets;
use crate::condense::selector::RemovalRun;
use crate::Event;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Cap on keyword-matched excerpts collected per category.
const MAX_MATCHES_PER_CATEGORY: usize = 20;

/// Excerpt length for each collected match, in characters.
const MATCH_EXCERPT_CHARS: usize = 100;

/// Placeholder for sections the rule-based path cannot reconstruct.
const PLACEHOLDER: &str = "see original history (rule-based summary, no LLM assistance)";

/// Compress a run without an LLM. Never fails, always returns a
/// `CondensationSummary` event bounded by `max_event_length`.
pub fn fallback_compress(
    run: &RemovalRun,
    keywords: &KeywordSets,
    max_event_length: usize,
) -> Event {
    let mut errors: Vec<String> = Vec::new();
    let mut successes: Vec<String> = Vec::new();
    let mut kind_counts: BTreeMap<&'static str, usize> = BTreeMap::new();

    for event in &run.events {
        *kind_counts.entry(event.kind.label()).or_insert(0) += 1;

        let lower = event.content.to_lowercase();
        if KeywordSets::matches(keywords.error, &lower) {
            if errors.len() < MAX_MATCHES_PER_CATEGORY {
                errors.push(excerpt(&event.content));
            }
        } else if KeywordSets::matches(keywords.success, &lower)
            && successes.len() < MAX_MATCHES_PER_CATEGORY
        {
            successes.push(excerpt(&event.content));
        }
    }

    let mut technical = format!("compressed {} events", run.len());
    if !kind_counts.is_empty() {
        let tallies: Vec<String> = kind_counts
            .iter()
            .map(|(kind, count)| format!("{kind}({count})"))
            .collect();
        let _ = write!(technical, "; kinds: {}", tallies.join(", "));
    }

    let mut content = String::new();
    let _ = writeln!(content, "Task context: {PLACEHOLDER}");
    let _ = writeln!(content, "Key progress: {}", join_or_placeholder(&successes));
    let _ = writeln!(content, "Technical state: {technical}");
    let _ = writeln!(content, "Pending items: {PLACEHOLDER}");
    let _ = write!(content, "Key findings: {}", join_or_placeholder(&errors));

    // summary_event_for_run applies the event-length clamp to the output.
    compressor::summary_event_for_run(run, &content, max_event_length)
}

fn excerpt(content: &str) -> String {
    if content.chars().count() > MATCH_EXCERPT_CHARS {
        let head: String = content.chars().take(MATCH_EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

fn join_or_placeholder(matches: &[String]) -> String {
    if matches.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        matches.join("; ")
    }
}
