//! Data models shared by the harvesting pipeline and the publish coordinator.
//!
//! This module defines the core data structures used throughout the application:
//! - [`CanonicalLink`]: A validated article permalink with its display title
//! - [`NormalizedDocument`]: One scrape response reduced to a fixed shape
//! - [`PublishState`]: The persisted single-flight / daily-guard record
//! - [`PublishRecord`] and [`PublishResult`]: The outcome of one publish attempt
//!
//! Everything that is persisted or returned over HTTP uses camelCase field
//! names, matching the JSON the state file and API clients already expect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// An article permalink on the target site.
///
/// `url` is absolute, https, on the target host, has a dated path and ends in
/// `.html`. It is the dedup key for the whole harvesting pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalLink {
    pub title: String,
    pub url: String,
}

/// A scrape response reduced to one canonical shape.
///
/// Every text field is empty rather than missing when the upstream payload did
/// not carry it. `documents` keeps all discovered sub-records so link
/// harvesting can mine each one independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDocument {
    pub summary: String,
    pub markdown: String,
    pub html: String,
    pub title: String,
    pub description: String,
    pub raw_text: String,
    pub metadata: Option<Value>,
    pub links: Vec<Value>,
    pub documents: Vec<Value>,
}

impl NormalizedDocument {
    /// True when at least one field that can carry article content or links is set.
    pub fn has_content(&self) -> bool {
        !self.summary.is_empty()
            || !self.links.is_empty()
            || !self.html.is_empty()
            || !self.raw_text.is_empty()
    }
}

/// Why a publish attempt was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishReason {
    Manual,
    Preview,
    Cron,
}

impl std::fmt::Display for PublishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PublishReason::Manual => "manual",
            PublishReason::Preview => "preview",
            PublishReason::Cron => "cron",
        };
        f.write_str(s)
    }
}

/// Caller options for one run of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Explicit article to publish; skips homepage harvesting.
    pub url: Option<String>,
    /// Shortlist position to pick instead of a random entry.
    pub index: Option<i64>,
    /// `false` runs a preview: no CMS write and no daily-date update.
    pub publish: bool,
    pub reason: PublishReason,
}

impl PublishRequest {
    /// The request the scheduled trigger makes.
    pub fn scheduled() -> Self {
        Self {
            url: None,
            index: None,
            publish: true,
            reason: PublishReason::Cron,
        }
    }
}

/// The created post as reported back by WordPress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordpressPost {
    pub id: u64,
    pub link: String,
    pub status: String,
}

/// The durable record of one successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub published: bool,
    pub source_url: String,
    pub source_title: String,
    pub generated_title: String,
    pub generated_hook: String,
    pub wordpress_post: Option<WordpressPost>,
}

/// What the last attempt (successful or not) left behind.
///
/// On success the [`PublishResult`] fields are flattened into the record; on
/// failure `error` carries the description instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    pub ok: bool,
    pub reason: PublishReason,
    pub completed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: Option<PublishResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishRecord {
    pub fn success(reason: PublishReason, completed_at: DateTime<Utc>, result: PublishResult) -> Self {
        Self {
            ok: true,
            reason,
            completed_at,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(reason: PublishReason, completed_at: DateTime<Utc>, error: String) -> Self {
        Self {
            ok: false,
            reason,
            completed_at,
            result: None,
            error: Some(error),
        }
    }
}

/// The process-wide publish state.
///
/// Starts out all null/false. `is_publishing` is only true while an attempt
/// is in flight; `last_published_date_ist` only moves on a real publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishState {
    #[serde(rename = "lastPublishedDateIST")]
    pub last_published_date_ist: Option<String>,
    pub last_publish_result: Option<PublishRecord>,
    pub is_publishing: bool,
}

impl PublishState {
    /// Decode a stored blob, filling every missing field from the defaults.
    ///
    /// A blob that doesn't decode at all is treated like a missing one.
    pub fn from_blob(blob: Option<Value>) -> Self {
        match blob {
            None | Some(Value::Null) => Self::default(),
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(error = %e, "Stored publish state is unreadable; using defaults");
                Self::default()
            }),
        }
    }

    pub fn to_blob(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Result of the daily-guarded trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DailyOutcome {
    Skipped { skipped: bool },
    Ran(PublishResult),
}

impl DailyOutcome {
    pub fn skipped() -> Self {
        DailyOutcome::Skipped { skipped: true }
    }
}
