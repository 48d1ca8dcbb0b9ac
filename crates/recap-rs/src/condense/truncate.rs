//! Per-event length clamp: head and tail survive, the middle is elided.
//!
//! Applied to every event's content before it is scored or included in a
//! compression prompt, and independently to compressor output. This bounds
//! the cost of a condensation cycle no matter how large individual events
//! are (a single pathological tool observation can be megabytes).

use std::borrow::Cow;

/// Marker format for elided content. The count is exact so readers can tell
/// how much is missing.
fn elision_marker(omitted: usize) -> String {
    format!("...[elided {omitted} chars]...")
}

/// Clamp `content` to roughly `max_len` characters.
///
/// Content at or under the budget is returned borrowed and untouched.
/// Oversized content keeps its first and last `max_len / 3` characters with
/// an exact-count elision marker in between. Character-based, never splits a
/// code point.
pub fn truncate(content: &str, max_len: usize) -> Cow<'_, str> {
    let total = content.chars().count();
    if total <= max_len {
        return Cow::Borrowed(content);
    }

    let piece = max_len / 3;
    let head: String = content.chars().take(piece).collect();
    let tail: String = content
        .chars()
        .skip(total - piece)
        .collect();
    let omitted = total - 2 * piece;

    Cow::Owned(format!("{head}{}{tail}", elision_marker(omitted)))
}
