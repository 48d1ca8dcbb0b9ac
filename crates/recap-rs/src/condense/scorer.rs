//! Importance scoring: which events can the agent afford to forget?
//!
//! `score(event, now)` is a pure function into `[0, 1]`. Higher means more
//! worth keeping. The heuristic is additive: a base score per event kind,
//! keyword bonuses for error / instruction / success / operational content,
//! and a small recency bonus, clamped at 1.0.
//!
//! Keyword matching is case-insensitive substring matching against bilingual
//! (English and Chinese) token lists. Each category contributes at most once
//! per event regardless of how many of its tokens match.
//!
//! Scores are recomputed every condensation cycle and never cached: the same
//! event scores differently as it ages out of the recency windows.

use crate::{ActionKind, Event, EventKind};
use chrono::{DateTime, Duration, Utc};

// ── Keyword tables ─────────────────────────────────────────────────

const ERROR_KEYWORDS: &[&str] = &[
    "error", "failed", "exception", "traceback", "stderr", "timeout", "denied", "错误", "失败",
    "异常", "报错",
];

const SUCCESS_KEYWORDS: &[&str] = &[
    "success", "completed", "finished", "done", "passed", "ok", "created", "updated", "成功",
    "完成", "通过",
];

const INSTRUCTION_KEYWORDS: &[&str] = &[
    "please", "can you", "help me", "i need", "create", "fix", "update", "请", "帮我", "需要",
    "创建", "修复", "更新", "添加", "删除",
];

const OPERATIONAL_KEYWORDS: &[&str] = &[
    "commit", "push", "merge", "deploy", "install", "build", "test", "git", "npm", "pip",
    "docker", "提交", "部署", "安装", "构建", "测试",
];

/// Immutable keyword tables, one list per category.
///
/// Shared between the scorer and the fallback compressor. Process-wide
/// immutable after construction; passing it explicitly keeps scoring pure
/// and testable with custom vocabularies.
#[derive(Debug, Clone, Copy)]
pub struct KeywordSets {
    pub error: &'static [&'static str],
    pub success: &'static [&'static str],
    pub instruction: &'static [&'static str],
    pub operational: &'static [&'static str],
}

impl Default for KeywordSets {
    fn default() -> Self {
        Self {
            error: ERROR_KEYWORDS,
            success: SUCCESS_KEYWORDS,
            instruction: INSTRUCTION_KEYWORDS,
            operational: OPERATIONAL_KEYWORDS,
        }
    }
}

impl KeywordSets {
    /// Whether any token in `list` occurs in `content_lower`.
    ///
    /// `content_lower` must already be lowercased; callers lowercase once
    /// per event rather than once per category.
    pub fn matches(list: &[&str], content_lower: &str) -> bool {
        list.iter().any(|kw| content_lower.contains(kw))
    }
}

// ── Scorer ─────────────────────────────────────────────────────────

/// Score contributions. The bases come from the event kind, the bonuses from
/// content and age.
const BASE_USER_MESSAGE: f64 = 0.4;
const BASE_ACTION_EDIT: f64 = 0.3;
const BASE_ACTION_COMMAND: f64 = 0.25;
const BASE_ACTION_BROWSE: f64 = 0.15;
const BASE_ACTION_OTHER: f64 = 0.2;
const BASE_OBSERVATION: f64 = 0.1;

const BONUS_ERROR: f64 = 0.3;
const BONUS_INSTRUCTION: f64 = 0.4;
const BONUS_SUCCESS: f64 = 0.2;
const BONUS_OPERATIONAL: f64 = 0.25;

const BONUS_FRESH_HOUR: f64 = 0.1;
const BONUS_FRESH_DAY: f64 = 0.05;

/// Pure importance heuristic over events.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceScorer {
    keywords: KeywordSets,
}

impl ImportanceScorer {
    pub fn new(keywords: KeywordSets) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordSets {
        &self.keywords
    }

    /// Score an event against a reference time. Deterministic, side-effect
    /// free, always in `[0, 1]`.
    pub fn score(&self, event: &Event, now: DateTime<Utc>) -> f64 {
        self.score_content(event.kind, event.timestamp, &event.content, now)
    }

    /// Score from parts. The selector calls this with truncated content so
    /// that scoring cost stays bounded for huge events.
    pub fn score_content(
        &self,
        kind: EventKind,
        timestamp: DateTime<Utc>,
        content: &str,
        now: DateTime<Utc>,
    ) -> f64 {
        let sum = base_score(kind)
            + self.content_bonus(content)
            + recency_bonus(timestamp, now);
        sum.clamp(0.0, 1.0)
    }

    fn content_bonus(&self, content: &str) -> f64 {
        if content.is_empty() {
            return 0.0;
        }
        let lower = content.to_lowercase();
        let mut bonus = 0.0;
        if KeywordSets::matches(self.keywords.error, &lower) {
            bonus += BONUS_ERROR;
        }
        if KeywordSets::matches(self.keywords.instruction, &lower) {
            bonus += BONUS_INSTRUCTION;
        }
        if KeywordSets::matches(self.keywords.success, &lower) {
            bonus += BONUS_SUCCESS;
        }
        if KeywordSets::matches(self.keywords.operational, &lower) {
            bonus += BONUS_OPERATIONAL;
        }
        bonus
    }
}

fn base_score(kind: EventKind) -> f64 {
    match kind {
        EventKind::UserMessage => BASE_USER_MESSAGE,
        EventKind::AgentAction(ActionKind::Edit) => BASE_ACTION_EDIT,
        EventKind::AgentAction(ActionKind::Command) => BASE_ACTION_COMMAND,
        EventKind::AgentAction(ActionKind::Browse) => BASE_ACTION_BROWSE,
        EventKind::AgentAction(ActionKind::Other) => BASE_ACTION_OTHER,
        // Summaries score like observations; the selector additionally
        // protects them from re-removal.
        EventKind::Observation | EventKind::CondensationSummary => BASE_OBSERVATION,
    }
}

/// Recency bonus: events from the last hour get +0.1, from the last day
/// +0.05. Events timestamped in the future count as fresh.
fn recency_bonus(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now.signed_duration_since(timestamp);
    if age <= Duration::hours(1) {
        BONUS_FRESH_HOUR
    } else if age <= Duration::hours(24) {
        BONUS_FRESH_DAY
    } else {
        0.0
    }
}
