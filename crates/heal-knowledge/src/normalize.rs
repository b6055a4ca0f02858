//! Optional signature normalization
//!
//! The decision policy keys on the raw message. Callers that want messages
//! differing only in ids or counts to share a record normalize first.

use regex::Regex;
use std::sync::OnceLock;

/// Default maximum length of a normalized signature, in characters
pub const DEFAULT_MAX_CHARS: usize = 80;

fn digit_runs() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d[\d-]*").expect("digit pattern is valid"))
}

/// Collapse digit runs to `#`, trim, and cap at `max_chars` characters
#[must_use]
pub fn normalize_signature(message: &str, max_chars: usize) -> String {
    let collapsed = digit_runs().replace_all(message.trim(), "#");
    collapsed.chars().take(max_chars).collect()
}
