//! Chat destinations and their per-type configuration.
//!
//! A destination row stores its type in a column and the type-specific
//! settings as JSON. Rows are turned into typed [`DestinationConfig`]s at
//! the registry boundary; rows that fail validation are kept as
//! [`DestinationEntry::Invalid`] so the failure shows up in the event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use crate::format::WireFamily;
use crate::ingest::{EventEnvelope, EventKind, Platform};

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

// =============================================================================
// Destination Type Enum
// =============================================================================

/// Chat service a destination delivers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    Telegram,
    Slack,
    Mattermost,
    Discord,
}

impl DestinationType {
    pub fn family(&self) -> WireFamily {
        match self {
            DestinationType::Telegram => WireFamily::RichMarkup,
            DestinationType::Slack => WireFamily::StructuredBlocks,
            DestinationType::Mattermost | DestinationType::Discord => WireFamily::Lightweight,
        }
    }
}

impl std::fmt::Display for DestinationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationType::Telegram => write!(f, "telegram"),
            DestinationType::Slack => write!(f, "slack"),
            DestinationType::Mattermost => write!(f, "mattermost"),
            DestinationType::Discord => write!(f, "discord"),
        }
    }
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Destination configuration that failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidConfig(pub String);

impl InvalidConfig {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Telegram accepts chat ids as numbers or `@channel` strings
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Telegram bot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub chat_id: String,
    /// Forum topic to post into
    #[serde(default)]
    pub thread_id: Option<i64>,
    /// Bot API base URL, for self-hosted Bot API servers
    #[serde(default)]
    pub api_url: Option<String>,
}

impl TelegramConfig {
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_TELEGRAM_API_URL)
            .trim_end_matches('/')
    }
}

/// Slack incoming webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub icon_emoji: Option<String>,
}

/// Mattermost incoming webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MattermostConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Discord webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Type-specific destination settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DestinationConfig {
    Telegram(TelegramConfig),
    Slack(SlackConfig),
    Mattermost(MattermostConfig),
    Discord(DiscordConfig),
}

impl DestinationConfig {
    pub fn destination_type(&self) -> DestinationType {
        match self {
            DestinationConfig::Telegram(_) => DestinationType::Telegram,
            DestinationConfig::Slack(_) => DestinationType::Slack,
            DestinationConfig::Mattermost(_) => DestinationType::Mattermost,
            DestinationConfig::Discord(_) => DestinationType::Discord,
        }
    }

    /// Full validation applied when a destination is loaded
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        match self {
            DestinationConfig::Telegram(config) => {
                if config.bot_token.trim().is_empty() {
                    return Err(InvalidConfig::new("Telegram bot token is required"));
                }
                if !config.bot_token.contains(':') {
                    return Err(InvalidConfig::new(
                        "Telegram bot token must look like <bot id>:<secret>",
                    ));
                }
                if config.chat_id.trim().is_empty() {
                    return Err(InvalidConfig::new("Telegram chat id is required"));
                }
                if let Some(api_url) = &config.api_url {
                    parse_http_url(api_url, "Telegram API")?;
                }
                Ok(())
            }
            DestinationConfig::Slack(config) => {
                let url = parse_http_url(&config.webhook_url, "Slack webhook")?;

                if url.scheme() != "https" {
                    return Err(InvalidConfig::new("Slack webhook URL must use HTTPS"));
                }
                // Exact host match so hooks.slack.com.evil.com is rejected
                if url.host_str() != Some("hooks.slack.com") {
                    return Err(InvalidConfig::new(
                        "Invalid Slack webhook URL: host must be hooks.slack.com",
                    ));
                }
                Ok(())
            }
            DestinationConfig::Mattermost(config) => {
                parse_http_url(&config.webhook_url, "Mattermost webhook").map(|_| ())
            }
            DestinationConfig::Discord(config) => {
                parse_http_url(&config.webhook_url, "Discord webhook").map(|_| ())
            }
        }
    }
}

/// Parses an http(s) URL, naming `what` in the error
pub fn parse_http_url(raw: &str, what: &str) -> Result<url::Url, InvalidConfig> {
    if raw.trim().is_empty() {
        return Err(InvalidConfig::new(format!("{} URL is required", what)));
    }

    let url = url::Url::parse(raw)
        .map_err(|_| InvalidConfig::new(format!("Invalid {} URL format", what)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(InvalidConfig::new(format!(
            "{} URL must use http or https, got {}",
            what, other
        ))),
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Optional per-destination event filters. An empty list allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationFilters {
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub event_types: Vec<EventKind>,
    /// Exact project names or `*` wildcard patterns
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,
}

impl DestinationFilters {
    /// Whether an event passes every configured filter
    pub fn should_notify(&self, envelope: &EventEnvelope) -> bool {
        if !self.platforms.is_empty() && !self.platforms.contains(&envelope.platform) {
            return false;
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&envelope.event_type) {
            return false;
        }
        if !self.projects.is_empty()
            && !self
                .projects
                .iter()
                .any(|pattern| wildcard_match(pattern, &envelope.project))
        {
            return false;
        }
        // Events without a branch (issues, comments) are not filtered by branch
        if let Some(branch) = &envelope.branch {
            if !self.branches.is_empty()
                && !self
                    .branches
                    .iter()
                    .any(|pattern| wildcard_match(pattern, branch))
            {
                return false;
            }
        }
        true
    }
}

/// Case-sensitive glob match where `*` matches any run of characters
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };

    let last_index = rest.len().saturating_sub(1);
    for (index, part) in rest.iter().enumerate() {
        if index == last_index {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(position) => remaining = &remaining[position + part.len()..],
            None => return false,
        }
    }
    true
}

// =============================================================================
// Destination Models
// =============================================================================

/// An active, validated destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: i32,
    pub name: String,
    pub config: DestinationConfig,
    pub filters: DestinationFilters,
}

impl Destination {
    pub fn destination_type(&self) -> DestinationType {
        self.config.destination_type()
    }
}

/// What the registry hands to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationEntry {
    Valid(Destination),
    /// Active row whose configuration cannot be used
    Invalid {
        id: i32,
        name: String,
        error: InvalidConfig,
    },
}

impl DestinationEntry {
    pub fn id(&self) -> i32 {
        match self {
            DestinationEntry::Valid(destination) => destination.id,
            DestinationEntry::Invalid { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DestinationEntry::Valid(destination) => &destination.name,
            DestinationEntry::Invalid { name, .. } => name,
        }
    }
}

impl From<Destination> for DestinationEntry {
    fn from(destination: Destination) -> Self {
        DestinationEntry::Valid(destination)
    }
}

/// Raw `destinations` table row
#[derive(Debug, Clone, FromRow)]
pub struct DestinationRow {
    pub id: i32,
    pub name: String,
    pub destination_type: String,
    pub config: serde_json::Value,
    pub filters: Option<serde_json::Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DestinationRow {
    /// Decodes and validates the row's configuration
    pub fn into_entry(self) -> DestinationEntry {
        match self.decode() {
            Ok((config, filters)) => DestinationEntry::Valid(Destination {
                id: self.id,
                name: self.name,
                config,
                filters,
            }),
            Err(error) => DestinationEntry::Invalid {
                id: self.id,
                name: self.name,
                error,
            },
        }
    }

    fn decode(&self) -> Result<(DestinationConfig, DestinationFilters), InvalidConfig> {
        let mut raw = self.config.clone();
        let object = raw
            .as_object_mut()
            .ok_or_else(|| InvalidConfig::new("config must be a JSON object"))?;
        object.insert(
            "type".to_string(),
            serde_json::Value::String(self.destination_type.to_lowercase()),
        );

        let config: DestinationConfig = serde_json::from_value(raw).map_err(|e| {
            InvalidConfig::new(format!("Invalid {} config: {}", self.destination_type, e))
        })?;
        config.validate()?;

        let filters = match &self.filters {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())
                .map_err(|e| InvalidConfig::new(format!("Invalid filters: {}", e)))?,
            _ => DestinationFilters::default(),
        };

        Ok((config, filters))
    }
}
