//! Slack incoming webhook sender.
//!
//! Slack answers a successful post with the literal body `ok`.

use serde_json::{json, Value};

use super::{response_text, Attempt};
use crate::format::{FormattedMessage, MessageBody};
use crate::models::SlackConfig;

/// Builds the webhook request body
pub fn payload(config: &SlackConfig, message: &FormattedMessage) -> Value {
    let mut payload = match &message.body {
        MessageBody::Blocks { blocks, fallback } => json!({
            "text": fallback,
            "blocks": blocks.iter().map(|b| b.to_json()).collect::<Vec<_>>(),
        }),
        MessageBody::Markdown { title, body } => json!({
            "text": format!("*{}*\n{}", title, body),
        }),
        MessageBody::Html { text } => json!({
            "text": text,
        }),
    };

    if let Some(channel) = &config.channel {
        payload["channel"] = json!(channel);
    }
    if let Some(username) = &config.username {
        payload["username"] = json!(username);
    }
    if let Some(icon_emoji) = &config.icon_emoji {
        payload["icon_emoji"] = json!(icon_emoji);
    }

    payload
}

/// Maps Slack's error codes to readable messages
fn describe_error(body: &str) -> String {
    match body.trim() {
        "invalid_token" => "Invalid Slack webhook URL".to_string(),
        "channel_not_found" => "Slack channel not found".to_string(),
        "channel_is_archived" => "Slack channel is archived".to_string(),
        "posting_to_general_channel_denied" => "Cannot post to #general channel".to_string(),
        "invalid_blocks" => "Slack rejected the message blocks".to_string(),
        other => format!("Slack API error: {}", other),
    }
}

pub(crate) async fn send(
    client: &reqwest::Client,
    config: &SlackConfig,
    message: &FormattedMessage,
) -> Attempt {
    let response = match client
        .post(&config.webhook_url)
        .json(&payload(config, message))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return Attempt::transport(&e, "Slack"),
    };

    let status = response.status();
    let body = response_text(response).await;

    if !status.is_success() {
        return match status.as_u16() {
            400 | 403 | 404 | 410 if !body.trim().is_empty() => {
                Attempt::rejected(status, format!("HTTP {}: {}", status.as_u16(), describe_error(&body)))
            }
            _ => Attempt::http_error(status, &body),
        };
    }

    if body.trim() == "ok" {
        Attempt::delivered(status)
    } else {
        Attempt::rejected(status, describe_error(&body))
    }
}
