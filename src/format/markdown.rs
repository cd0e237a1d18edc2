//! Markdown rendering for Mattermost and Discord.
//!
//! The title is kept apart from the body: Discord puts it in the embed
//! title and Mattermost prepends it as a heading.

use super::{fit_lines, Layout, MessageBody, LIGHTWEIGHT_LIMIT, TITLE_LIMIT};

/// Values inside inline code cannot contain backticks
fn code(text: &str) -> String {
    format!("`{}`", text.replace('`', "'"))
}

/// Backslash-escapes characters that start links or emphasis
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']' | '(' | ')' | '*' | '_' | '`' | '~') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Percent-encodes characters that would end a link target early
pub fn link_target(url: &str) -> String {
    url.replace('(', "%28")
        .replace(')', "%29")
        .replace(' ', "%20")
        .replace('<', "%3C")
        .replace('>', "%3E")
}

pub(crate) fn render(layout: &Layout<'_>) -> MessageBody {
    let title = fit_lines(
        vec![format!("{} {}: {}", layout.emoji, layout.heading, layout.project)],
        TITLE_LIMIT,
    );

    let mut lines = Vec::with_capacity(layout.rows.len() + layout.details.len() + 8);
    for row in &layout.rows {
        let value = if row.code {
            code(&row.value)
        } else {
            escape(&row.value)
        };
        lines.push(format!("**{}:** {}", row.label, value));
    }

    lines.push(String::new());
    lines.push(format!("> {}", escape(&layout.summary).replace('\n', "\n> ")));

    if !layout.details.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "**{}:** {}",
            layout.details_heading, layout.total_details
        ));
        for item in layout.details {
            let text = escape(&Layout::detail_text(item));
            let mut line = match &item.url {
                Some(url) => format!(
                    "- [{}]({}) {}",
                    code(item.short_id()),
                    link_target(url),
                    text
                ),
                None => format!("- {} {}", code(item.short_id()), text),
            };
            if let Some(author) = &item.author {
                line.push_str(&format!(" _({})_", escape(author)));
            }
            lines.push(line);
        }
        if let Some(more) = layout.more_marker() {
            lines.push(format!("- {}", more));
        }
    }

    if let Some(url) = layout.url {
        lines.push(String::new());
        lines.push(format!("[View details]({})", link_target(url)));
    }

    MessageBody::Markdown {
        title,
        body: fit_lines(lines, LIGHTWEIGHT_LIMIT),
    }
}
