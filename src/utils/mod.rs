//! Common utilities and helper functions
//!
//! This module provides shared helpers used across the engine.

pub mod retry;

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Extract the first integer appearing in free text
///
/// Constraint descriptions carry numeric thresholds as prose, e.g.
/// "max 10 screener days this quarter".
pub fn parse_first_integer(text: &str) -> Option<i64> {
    static INT_RE: OnceLock<Regex> = OnceLock::new();

    let re = INT_RE.get_or_init(|| Regex::new(r"-?\d+").expect("Invalid regex pattern"));
    re.find(text)?.as_str().parse().ok()
}

/// Format a closed date range for human-readable reports
pub fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    if start == end {
        start.format("%Y-%m-%d").to_string()
    } else {
        format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
    }
}

/// Truncate text to a maximum length
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        let truncated = &text[..max_len.saturating_sub(3)];
        format!("{truncated}...")
    }
}
