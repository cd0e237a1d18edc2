//! Platform detection from webhook headers.
//!
//! Every supported platform tags its requests with a distinct event header.
//! Body shapes overlap ("push" looks alike everywhere) so the body is never
//! consulted here.

use std::collections::HashMap;

use actix_web::http::header::HeaderMap;

use crate::error::PipelineError;
use crate::ingest::Platform;

pub const GITLAB_EVENT_HEADER: &str = "x-gitlab-event";
pub const GITHUB_EVENT_HEADER: &str = "x-github-event";
pub const BITBUCKET_EVENT_HEADER: &str = "x-event-key";

/// Headers checked in priority order
const SIGNATURE_HEADERS: [(&str, Platform); 3] = [
    (GITLAB_EVENT_HEADER, Platform::Gitlab),
    (GITHUB_EVENT_HEADER, Platform::Github),
    (BITBUCKET_EVENT_HEADER, Platform::Bitbucket),
];

/// Request headers with lowercased names
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    inner: HashMap<String, String>,
}

impl WebhookHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the UTF-8 headers out of an actix header map
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let inner = map
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        Self { inner }
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.inner.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for WebhookHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = WebhookHeaders::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

/// Result of platform detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    pub platform: Platform,
    /// Raw value of the platform's event header, e.g. "Push Hook"
    pub event_hint: String,
}

/// Classifies the source platform from its signature header
pub fn detect(headers: &WebhookHeaders) -> Result<Detected, PipelineError> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|(header, platform)| {
            headers.get(header).map(|value| Detected {
                platform: *platform,
                event_hint: value.trim().to_string(),
            })
        })
        .ok_or(PipelineError::UnknownPlatform)
}
