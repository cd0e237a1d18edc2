//! Rendering of event envelopes into destination-ready messages.
//!
//! One renderer per wire family. All of them share the same [`Layout`] so a
//! push looks the same in Telegram, Slack and Discord, only the markup
//! differs. Formatting is total: every envelope yields a non-empty message
//! within the family's size limit.

pub mod blocks;
pub mod html;
pub mod markdown;

use serde::{Deserialize, Serialize};

use crate::ingest::parser::truncate;
use crate::ingest::{DetailItem, EventEnvelope, EventKind};

pub use blocks::Block;

/// Telegram message text limit
pub const RICH_MARKUP_LIMIT: usize = 4096;
/// Mattermost / Discord description limit
pub const LIGHTWEIGHT_LIMIT: usize = 4000;
/// Discord embed titles are capped at 256 characters
pub const TITLE_LIMIT: usize = 256;
pub const MAX_BLOCKS: usize = 50;
pub const SECTION_TEXT_LIMIT: usize = 3000;
pub const HEADER_TEXT_LIMIT: usize = 150;

pub const DEFAULT_MAX_COMMITS: usize = 3;

const COMMIT_MESSAGE_LENGTH: usize = 80;
const SUMMARY_LENGTH: usize = 500;

/// Markup dialect a destination understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFamily {
    /// HTML subset (Telegram)
    RichMarkup,
    /// Markdown with a separate title (Mattermost, Discord)
    Lightweight,
    /// Slack Block Kit
    StructuredBlocks,
}

#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// How many detail items to list before the "+K more" marker
    pub max_commits: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_commits: DEFAULT_MAX_COMMITS,
        }
    }
}

/// Overall sentiment of an event, used for accent colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Failure,
    Pending,
    Neutral,
}

impl Tone {
    pub fn from_state(state: Option<&str>) -> Self {
        match state {
            Some("success" | "merged" | "approved" | "published" | "created" | "released") => {
                Tone::Success
            }
            Some("failed" | "declined" | "canceled" | "changes_requested") => Tone::Failure,
            Some("running" | "pending" | "opened" | "reopened") => Tone::Pending,
            _ => Tone::Neutral,
        }
    }

    /// RGB accent colour
    pub fn color(&self) -> u32 {
        match self {
            Tone::Success => 0x2e_cc_71,
            Tone::Failure => 0xe7_4c_3c,
            Tone::Pending => 0xf1_c4_0f,
            Tone::Neutral => 0x58_65_f2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Html { text: String },
    Markdown { title: String, body: String },
    Blocks { blocks: Vec<Block>, fallback: String },
}

/// A message ready to hand to a sender
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedMessage {
    pub body: MessageBody,
    pub tone: Tone,
    pub url: Option<String>,
}

impl FormattedMessage {
    pub fn family(&self) -> WireFamily {
        match self.body {
            MessageBody::Html { .. } => WireFamily::RichMarkup,
            MessageBody::Markdown { .. } => WireFamily::Lightweight,
            MessageBody::Blocks { .. } => WireFamily::StructuredBlocks,
        }
    }

    /// Length of the main text as the destination measures it
    pub fn text_len(&self) -> usize {
        match &self.body {
            MessageBody::Html { text } => text.chars().count(),
            MessageBody::Markdown { body, .. } => body.chars().count(),
            MessageBody::Blocks { fallback, .. } => fallback.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.body {
            MessageBody::Html { text } => text.trim().is_empty(),
            MessageBody::Markdown { title, body } => title.trim().is_empty() || body.trim().is_empty(),
            MessageBody::Blocks { blocks, fallback } => blocks.is_empty() || fallback.trim().is_empty(),
        }
    }
}

pub fn format(envelope: &EventEnvelope, family: WireFamily) -> FormattedMessage {
    format_with(envelope, family, &FormatOptions::default())
}

pub fn format_with(
    envelope: &EventEnvelope,
    family: WireFamily,
    options: &FormatOptions,
) -> FormattedMessage {
    let layout = Layout::new(envelope, options);
    let body = match family {
        WireFamily::RichMarkup => html::render(&layout),
        WireFamily::Lightweight => markdown::render(&layout),
        WireFamily::StructuredBlocks => blocks::render(&layout),
    };

    FormattedMessage {
        body,
        tone: Tone::from_state(envelope.state.as_deref()),
        url: envelope.url.clone(),
    }
}

// =============================================================================
// Shared layout
// =============================================================================

/// Label/value line in the message header area
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub label: String,
    pub value: String,
    /// Render the value as inline code
    pub code: bool,
}

impl Row {
    fn text(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            code: false,
        }
    }

    fn code(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            code: true,
        }
    }
}

/// Family-independent content of a message
#[derive(Debug)]
pub(crate) struct Layout<'a> {
    pub emoji: &'static str,
    /// e.g. "GitLab · Merge Request"
    pub heading: String,
    pub project: &'a str,
    pub author: &'a str,
    pub rows: Vec<Row>,
    pub summary: String,
    pub details_heading: &'static str,
    pub total_details: usize,
    pub details: &'a [DetailItem],
    pub hidden: usize,
    pub url: Option<&'a str>,
}

impl<'a> Layout<'a> {
    pub fn new(envelope: &'a EventEnvelope, options: &FormatOptions) -> Self {
        let mut rows = vec![
            Row::text("Project", envelope.project.as_str()),
            Row::text("Author", envelope.author.as_str()),
        ];
        if let Some(branch) = &envelope.branch {
            let label = match envelope.event_type {
                EventKind::TagPush => "Tag",
                _ => "Branch",
            };
            rows.push(Row::code(label, branch.as_str()));
        }
        if let Some(state) = &envelope.state {
            rows.push(Row::text(
                "Status",
                format!("{} {}", status_emoji(state), humanize(state)),
            ));
        }
        for fact in &envelope.facts {
            // Tag pushes already show the tag as their ref
            if envelope.event_type == EventKind::TagPush && fact.label == "Tag" {
                continue;
            }
            rows.push(Row::text(fact.label.as_str(), fact.value.as_str()));
        }

        let shown = envelope.details.len().min(options.max_commits);

        Self {
            emoji: event_emoji(envelope.event_type),
            heading: format!(
                "{} · {}",
                envelope.platform.display_name(),
                envelope.event_type.title()
            ),
            project: &envelope.project,
            author: &envelope.author,
            rows,
            summary: if envelope.summary.trim().is_empty() {
                format!("{} in {}", envelope.event_type.title(), envelope.project)
            } else {
                truncate(&envelope.summary, SUMMARY_LENGTH)
            },
            details_heading: match envelope.event_type {
                EventKind::WikiPage => "Pages",
                _ => "Commits",
            },
            total_details: envelope.total_details.max(envelope.details.len()),
            details: &envelope.details[..shown],
            hidden: envelope.hidden_details(shown),
            url: envelope.url.as_deref(),
        }
    }

    /// First line of a detail item, shortened for list display
    pub fn detail_text(item: &DetailItem) -> String {
        let title = item.title();
        if title.is_empty() {
            return "(no message)".to_string();
        }
        truncate(title, COMMIT_MESSAGE_LENGTH)
    }

    pub fn more_marker(&self) -> Option<String> {
        (self.hidden > 0).then(|| format!("+{} more", self.hidden))
    }

    /// One-line plain summary used for notification previews
    pub fn fallback(&self) -> String {
        format!(
            "{} {} in {} by {}: {}",
            self.emoji, self.heading, self.project, self.author, self.summary
        )
    }
}

pub(crate) fn event_emoji(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Push => "📤",
        EventKind::TagPush => "🏷️",
        EventKind::MergeRequest => "🔀",
        EventKind::Issue => "🐛",
        EventKind::Note => "💬",
        EventKind::Pipeline => "🔧",
        EventKind::WikiPage => "📝",
        EventKind::Release => "🚀",
    }
}

pub(crate) fn status_emoji(state: &str) -> &'static str {
    match state {
        "success" | "merged" => "✅",
        "failed" => "❌",
        "running" | "pending" => "⏳",
        "canceled" => "🚫",
        "skipped" => "⏭️",
        "opened" | "reopened" => "🔓",
        "closed" | "declined" => "🔒",
        "updated" => "📝",
        "commented" => "💬",
        "approved" => "👍",
        "deleted" => "🗑️",
        "created" | "published" | "released" => "✨",
        _ => "ℹ️",
    }
}

/// "changes_requested" -> "Changes requested"
pub(crate) fn humanize(word: &str) -> String {
    let spaced = word.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Joins lines, dropping whole lines from the end until the text fits.
///
/// The first line is always kept; if it alone exceeds the limit it is cut.
pub(crate) fn fit_lines(mut lines: Vec<String>, limit: usize) -> String {
    let mut total: usize = lines.iter().map(|l| l.chars().count()).sum::<usize>()
        + lines.len().saturating_sub(1);

    while lines.len() > 1 && total > limit {
        if let Some(dropped) = lines.pop() {
            total -= dropped.chars().count() + 1;
        }
    }
    while lines.len() > 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let text = lines.join("\n");
    if text.chars().count() > limit {
        text.chars().take(limit).collect()
    } else {
        text
    }
}
