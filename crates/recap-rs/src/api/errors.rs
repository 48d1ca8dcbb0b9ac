//! String-level classification of completion failures.
//!
//! The [`Completer`](super::Completer) seam reports failures as descriptive
//! strings. These matchers sort them into the buckets the compressor's error
//! taxonomy distinguishes: rate limiting, timeouts, and plain transport
//! failures. HTTP statuses are matched as `"HTTP <code>"` substrings, which
//! is how the bundled client formats them.

/// Whether an error string indicates the endpoint rate-limited the call.
pub fn is_rate_limit_error(error: &str) -> bool {
    if error.contains("HTTP 429") {
        return true;
    }
    let lower = error.to_lowercase();
    ["rate limit", "rate-limited", "too many requests"]
        .iter()
        .any(|p| lower.contains(p))
}

/// Whether an error string indicates the call timed out in transit.
pub fn is_timeout_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    ["timed out", "timeout", "deadline exceeded"]
        .iter()
        .any(|p| lower.contains(p))
}

/// Whether an error string indicates a transport-level failure (5xx,
/// connection trouble, unreadable response).
pub fn is_transport_error(error: &str) -> bool {
    let transient_statuses = ["500", "502", "503", "504"];
    if transient_statuses
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "broken pipe",
        "network",
        "failed to read response",
        "failed to parse response",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detected() {
        assert!(is_rate_limit_error("completion API HTTP 429: slow down"));
        assert!(is_rate_limit_error("provider says: Rate limit exceeded"));
        assert!(!is_rate_limit_error("completion API HTTP 500: oops"));
    }

    #[test]
    fn timeout_detected() {
        assert!(is_timeout_error("request failed: operation timed out"));
        assert!(is_timeout_error("deadline exceeded while waiting"));
        assert!(!is_timeout_error("completion API HTTP 400: bad request"));
    }

    #[test]
    fn transport_detected() {
        assert!(is_transport_error("completion API HTTP 502: bad gateway"));
        assert!(is_transport_error("request failed: connection reset by peer"));
        assert!(is_transport_error("failed to parse response: EOF"));
        assert!(!is_transport_error("completion API HTTP 429: slow down"));
    }
}
