//! Platform payload parsers.
//!
//! Each platform owns a fixed table of native event types it understands.
//! Only `project`, `author` and the event type are mandatory; every other
//! field is best-effort and simply left empty when absent.

pub mod bitbucket;
pub mod github;
pub mod gitlab;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::error::PipelineError;
use crate::ingest::{DetailItem, EventEnvelope, Platform};

/// Maximum length of free text (descriptions, comments) kept in an envelope
pub const MAX_TEXT_LENGTH: usize = 200;

const NULL: Value = Value::Null;

/// Parses a raw request body into an envelope
pub fn parse(platform: Platform, event_hint: &str, body: &[u8]) -> Result<EventEnvelope, PipelineError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PipelineError::MalformedPayload(format!("invalid JSON: {}", e)))?;
    parse_value(platform, event_hint, value)
}

/// Parses an already-decoded JSON payload into an envelope
pub fn parse_value(
    platform: Platform,
    event_hint: &str,
    body: Value,
) -> Result<EventEnvelope, PipelineError> {
    if !body.is_object() {
        return Err(PipelineError::MalformedPayload(
            "payload must be a JSON object".to_string(),
        ));
    }

    match platform {
        Platform::Gitlab => gitlab::parse(event_hint, body),
        Platform::Github => github::parse(event_hint, body),
        Platform::Bitbucket => bitbucket::parse(event_hint, body),
    }
}

// =============================================================================
// Field access helpers
// =============================================================================

/// Read-only view over a JSON payload with path lookups
#[derive(Clone, Copy)]
pub(crate) struct Fields<'a>(pub &'a Value);

impl<'a> Fields<'a> {
    /// Descends into a nested object; missing keys yield `null`
    pub fn at(&self, path: &[&str]) -> Fields<'a> {
        let mut current = self.0;
        for key in path {
            current = current.get(key).unwrap_or(&NULL);
        }
        Fields(current)
    }

    pub fn is_present(&self) -> bool {
        !self.0.is_null()
    }

    /// Non-blank string at `path`
    pub fn str(&self, path: &[&str]) -> Option<&'a str> {
        self.at(path)
            .0
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn string(&self, path: &[&str]) -> Option<String> {
        self.str(path).map(str::to_string)
    }

    /// First non-blank string among candidate paths
    pub fn first(&self, paths: &[&[&str]]) -> Option<&'a str> {
        paths.iter().find_map(|path| self.str(path))
    }

    /// Like [`Fields::first`] but a missing value is a malformed payload
    pub fn require(&self, paths: &[&[&str]], what: &str) -> Result<String, PipelineError> {
        self.first(paths)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::MalformedPayload(format!("missing {}", what)))
    }

    /// Integer at `path`, accepting numbers or numeric strings
    pub fn u64(&self, path: &[&str]) -> Option<u64> {
        let value = self.at(path).0;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }

    pub fn bool(&self, path: &[&str]) -> Option<bool> {
        self.at(path).0.as_bool()
    }

    pub fn array(&self, path: &[&str]) -> &'a [Value] {
        self.at(path)
            .0
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A commit as found in a payload, before ordering
pub(crate) struct RawCommit {
    pub item: DetailItem,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl RawCommit {
    pub fn new(item: DetailItem, timestamp: Option<&str>) -> Self {
        Self {
            item,
            timestamp: timestamp.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()),
        }
    }
}

/// Orders commits newest first.
///
/// Timestamps win when every commit carries one; otherwise the platform's
/// native order is trusted (`chronological` = oldest first).
pub(crate) fn newest_first(mut commits: Vec<RawCommit>, chronological: bool) -> Vec<DetailItem> {
    if !commits.is_empty() && commits.iter().all(|c| c.timestamp.is_some()) {
        // Stable sort keeps native order for equal timestamps
        if chronological {
            commits.reverse();
        }
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    } else if chronological {
        commits.reverse();
    }

    commits.into_iter().map(|c| c.item).collect()
}

/// Truncates to `max_length` characters, appending "..." when shortened
pub fn truncate(text: &str, max_length: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_length.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Removes `refs/heads/` or `refs/tags/`
pub fn short_ref(reference: &str) -> &str {
    reference
        .strip_prefix("refs/heads/")
        .or_else(|| reference.strip_prefix("refs/tags/"))
        .unwrap_or(reference)
}

/// True for the all-zero SHA platforms send for created/deleted refs
pub fn is_null_sha(sha: Option<&str>) -> bool {
    sha.is_some_and(|s| !s.is_empty() && s.chars().all(|c| c == '0'))
}

/// Maps platform-specific CI statuses onto a shared vocabulary
pub fn normalize_status(status: &str) -> String {
    match status.to_ascii_lowercase().as_str() {
        "success" | "successful" | "passed" | "completed" => "success".to_string(),
        "failed" | "failure" | "error" | "timed_out" => "failed".to_string(),
        "canceled" | "cancelled" | "stopped" => "canceled".to_string(),
        "running" | "inprogress" | "in_progress" => "running".to_string(),
        "pending" | "queued" | "created" | "waiting" | "requested" => "pending".to_string(),
        "skipped" | "neutral" => "skipped".to_string(),
        other => other.to_string(),
    }
}

/// Human-readable duration, e.g. "1m 05s"
pub fn format_duration(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m {:02}s", s / 60, s % 60),
        s => format!("{}h {:02}m", s / 3600, (s % 3600) / 60),
    }
}
