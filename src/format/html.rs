//! Telegram HTML rendering.

use super::{fit_lines, Layout, MessageBody, RICH_MARKUP_LIMIT};

/// Escapes the characters Telegram's HTML parser treats specially
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub(crate) fn render(layout: &Layout<'_>) -> MessageBody {
    let mut lines = vec![
        format!("<b>{} {}</b>", layout.emoji, escape(&layout.heading)),
        String::new(),
    ];

    for row in &layout.rows {
        let value = if row.code {
            format!("<code>{}</code>", escape(&row.value))
        } else {
            escape(&row.value)
        };
        lines.push(format!("<b>{}:</b> {}", escape(&row.label), value));
    }

    lines.push(String::new());
    lines.push(format!("<i>{}</i>", escape(&layout.summary)));

    if !layout.details.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "<b>{}:</b> {}",
            layout.details_heading, layout.total_details
        ));
        for item in layout.details {
            let mut line = format!(
                "• <code>{}</code> {}",
                escape(item.short_id()),
                escape(&Layout::detail_text(item))
            );
            if let Some(author) = &item.author {
                line.push_str(&format!(" <i>({})</i>", escape(author)));
            }
            lines.push(line);
        }
        if let Some(more) = layout.more_marker() {
            lines.push(format!("• {}", more));
        }
    }

    if let Some(url) = layout.url {
        lines.push(String::new());
        lines.push(format!("<a href=\"{}\">View details</a>", escape(url)));
    }

    MessageBody::Html {
        text: fit_lines(lines, RICH_MARKUP_LIMIT),
    }
}
