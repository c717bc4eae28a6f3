//! Utility functions for alias resolution, IST calendar keys, string shaping and
//! file system checks.
//!
//! This module provides helpers used throughout the application:
//! - First-non-empty resolution over ordered candidate lists
//! - Date keys in the fixed publishing timezone (IST, UTC+05:30)
//! - String truncation and title-casing for logs and derived titles
//! - JSON error detection for handling truncated LLM responses
//! - File system validation for the state file location

use chrono::{DateTime, FixedOffset, Utc};
use itertools::Itertools;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Offset of India Standard Time from UTC, in seconds.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// The fixed timezone the daily guard counts calendar days in.
pub const IST: FixedOffset = match FixedOffset::east_opt(IST_OFFSET_SECS) {
    Some(offset) => offset,
    None => panic!("IST offset out of range"),
};

/// Calendar date of `now` in IST, formatted `YYYY-MM-DD`.
///
/// # Examples
///
/// ```ignore
/// // 20:00 UTC is already the next day in IST.
/// let now = "2024-05-01T20:00:00Z".parse().unwrap();
/// assert_eq!(ist_date_key(now), "2024-05-02");
/// ```
pub fn ist_date_key(now: DateTime<Utc>) -> String {
    now.with_timezone(&IST).format("%Y-%m-%d").to_string()
}

/// Return the first candidate that is a non-blank string, trimmed.
///
/// This is the one resolution primitive every "try several spellings" lookup
/// goes through. Absent and whitespace-only candidates are skipped; when
/// nothing qualifies the result is an empty string.
pub fn pick_first_non_empty<'a, I>(candidates: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a char boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Upper-case the first letter of every whitespace-separated word.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(title_case("new  zero day"), "New Zero Day");
/// ```
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .join(" ")
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off by its token limit the JSON fails with an
/// EOF error, which is worth reporting differently from prose output.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("State directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("(+18 bytes)"));
    }

    #[test]
    fn test_pick_first_non_empty() {
        assert_eq!(pick_first_non_empty([None, Some("  "), Some(" b "), Some("c")]), "b");
        assert_eq!(pick_first_non_empty([None, Some("")]), "");
        assert_eq!(pick_first_non_empty(Vec::<Option<&str>>::new()), "");
    }

    #[test]
    fn test_ist_date_key_rolls_over_before_utc_midnight() {
        let evening_utc: DateTime<Utc> = "2024-05-01T18:29:59Z".parse().unwrap();
        let past_ist_midnight: DateTime<Utc> = "2024-05-01T18:30:00Z".parse().unwrap();
        assert_eq!(ist_date_key(evening_utc), "2024-05-01");
        assert_eq!(ist_date_key(past_ist_midnight), "2024-05-02");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hello world"), "Hello World");
        assert_eq!(title_case("  spaced   out "), "Spaced Out");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        let err = result.unwrap_err();
        assert!(looks_truncated(&err));

        let prose: Result<serde_json::Value, _> = serde_json::from_str("Sure! Here it is");
        assert!(!looks_truncated(&prose.unwrap_err()));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
