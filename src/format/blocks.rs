//! Slack Block Kit rendering.

use serde_json::{json, Value};

use super::{
    fit_lines, Layout, MessageBody, HEADER_TEXT_LIMIT, MAX_BLOCKS, SECTION_TEXT_LIMIT,
};

/// Slack allows at most 10 fields per section, 2000 characters each
const MAX_FIELDS: usize = 10;
const FIELD_TEXT_LIMIT: usize = 2000;

/// A typed Block Kit block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Header { text: String },
    Fields { fields: Vec<String> },
    Section { text: String },
    Divider,
    LinkButton { text: String, url: String },
}

impl Block {
    pub fn to_json(&self) -> Value {
        match self {
            Block::Header { text } => json!({
                "type": "header",
                "text": {"type": "plain_text", "text": text, "emoji": true}
            }),
            Block::Fields { fields } => json!({
                "type": "section",
                "fields": fields
                    .iter()
                    .map(|f| json!({"type": "mrkdwn", "text": f}))
                    .collect::<Vec<_>>()
            }),
            Block::Section { text } => json!({
                "type": "section",
                "text": {"type": "mrkdwn", "text": text}
            }),
            Block::Divider => json!({"type": "divider"}),
            Block::LinkButton { text, url } => json!({
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "text": {"type": "plain_text", "text": text, "emoji": true},
                    "url": url,
                    "style": "primary"
                }]
            }),
        }
    }
}

/// Escapes the control characters of Slack's mrkdwn
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn clamp(text: String, limit: usize) -> String {
    fit_lines(vec![text], limit)
}

pub(crate) fn render(layout: &Layout<'_>) -> MessageBody {
    let mut blocks = vec![Block::Header {
        text: clamp(
            format!("{} {}", layout.emoji, layout.heading),
            HEADER_TEXT_LIMIT,
        ),
    }];

    let mut fields = Vec::new();
    let mut overflow = Vec::new();
    for row in &layout.rows {
        let value = if row.code {
            format!("`{}`", escape(&row.value).replace('`', "'"))
        } else {
            escape(&row.value)
        };
        let text = clamp(format!("*{}:*\n{}", escape(&row.label), value), FIELD_TEXT_LIMIT);
        if fields.len() < MAX_FIELDS {
            fields.push(text);
        } else {
            overflow.push(text.replace(":*\n", ":* "));
        }
    }
    blocks.push(Block::Fields { fields });
    if !overflow.is_empty() {
        blocks.push(Block::Section {
            text: fit_lines(overflow, SECTION_TEXT_LIMIT),
        });
    }

    blocks.push(Block::Section {
        text: clamp(escape(&layout.summary), SECTION_TEXT_LIMIT),
    });

    if !layout.details.is_empty() {
        let mut lines = vec![format!(
            "*{}:* {}",
            layout.details_heading, layout.total_details
        )];
        for item in layout.details {
            let text = escape(&Layout::detail_text(item));
            let id = escape(item.short_id());
            let mut line = match &item.url {
                Some(url) => format!("• <{}|`{}`> {}", url, id, text),
                None => format!("• `{}` {}", id, text),
            };
            if let Some(author) = &item.author {
                line.push_str(&format!(" _({})_", escape(author)));
            }
            lines.push(line);
        }
        if let Some(more) = layout.more_marker() {
            lines.push(format!("• {}", more));
        }
        blocks.push(Block::Divider);
        blocks.push(Block::Section {
            text: fit_lines(lines, SECTION_TEXT_LIMIT),
        });
    }

    if let Some(url) = layout.url {
        blocks.push(Block::LinkButton {
            text: "View details".to_string(),
            url: url.to_string(),
        });
    }

    blocks.truncate(MAX_BLOCKS);

    MessageBody::Blocks {
        blocks,
        fallback: clamp(layout.fallback(), SECTION_TEXT_LIMIT),
    }
}
