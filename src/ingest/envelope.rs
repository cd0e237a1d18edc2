use serde::{Deserialize, Serialize};

/// Git hosting platform a webhook originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Gitlab,
    Github,
    Bitbucket,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Gitlab => "gitlab",
            Platform::Github => "github",
            Platform::Bitbucket => "bitbucket",
        }
    }

    /// Human-readable name used in message badges
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Gitlab => "GitLab",
            Platform::Github => "GitHub",
            Platform::Bitbucket => "Bitbucket",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized event vocabulary shared by all platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    TagPush,
    MergeRequest,
    Issue,
    Note,
    Pipeline,
    WikiPage,
    Release,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Push,
        EventKind::TagPush,
        EventKind::MergeRequest,
        EventKind::Issue,
        EventKind::Note,
        EventKind::Pipeline,
        EventKind::WikiPage,
        EventKind::Release,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::TagPush => "tag_push",
            EventKind::MergeRequest => "merge_request",
            EventKind::Issue => "issue",
            EventKind::Note => "note",
            EventKind::Pipeline => "pipeline",
            EventKind::WikiPage => "wiki_page",
            EventKind::Release => "release",
        }
    }

    /// Title-cased label, e.g. "Merge Request"
    pub fn title(&self) -> &'static str {
        match self {
            EventKind::Push => "Push",
            EventKind::TagPush => "Tag Push",
            EventKind::MergeRequest => "Merge Request",
            EventKind::Issue => "Issue",
            EventKind::Note => "Comment",
            EventKind::Pipeline => "Pipeline",
            EventKind::WikiPage => "Wiki Page",
            EventKind::Release => "Release",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sub-item of an event, typically a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailItem {
    pub id: String,
    pub message: String,
    pub author: Option<String>,
    pub url: Option<String>,
}

impl DetailItem {
    /// Abbreviated commit id (first 8 characters)
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// First line of the message
    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

/// Event-specific label/value pair (e.g. "Duration" / "42s")
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    pub label: String,
    pub value: String,
}

impl Fact {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Platform-agnostic representation of one inbound Git event
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub platform: Platform,
    pub event_type: EventKind,
    pub project: String,
    pub author: String,
    pub branch: Option<String>,
    pub summary: String,
    /// Sub-items, newest first
    pub details: Vec<DetailItem>,
    /// Count reported by the platform, which may exceed `details.len()`
    pub total_details: usize,
    pub url: Option<String>,
    /// Status or action word: "opened", "merged", "success", ...
    pub state: Option<String>,
    pub facts: Vec<Fact>,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl EventEnvelope {
    /// Number of sub-items not present in `details`' displayed window
    pub fn hidden_details(&self, shown: usize) -> usize {
        self.total_details.max(self.details.len()).saturating_sub(shown)
    }
}

/// Event metadata for the event log, available even when parsing failed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventMetadata {
    pub platform: Option<Platform>,
    pub event_type: Option<String>,
    pub project: Option<String>,
    pub author: Option<String>,
    pub branch: Option<String>,
}

impl From<&EventEnvelope> for EventMetadata {
    fn from(envelope: &EventEnvelope) -> Self {
        Self {
            platform: Some(envelope.platform),
            event_type: Some(envelope.event_type.to_string()),
            project: Some(envelope.project.clone()),
            author: Some(envelope.author.clone()),
            branch: envelope.branch.clone(),
        }
    }
}
