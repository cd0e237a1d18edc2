//! Discord webhook sender. Messages go out as a single embed.

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::{response_text, Attempt};
use crate::format::{FormattedMessage, MessageBody, LIGHTWEIGHT_LIMIT, TITLE_LIMIT};
use crate::models::DiscordConfig;

const DEFAULT_USERNAME: &str = "Gitrelay";

fn clip(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Builds the webhook request body
pub fn payload(config: &DiscordConfig, message: &FormattedMessage) -> Value {
    let (title, description) = match &message.body {
        MessageBody::Markdown { title, body } => (title.clone(), body.clone()),
        MessageBody::Html { text } => {
            let mut lines = text.splitn(2, '\n');
            let title = lines.next().unwrap_or_default().to_string();
            (title, lines.next().unwrap_or_default().to_string())
        }
        MessageBody::Blocks { fallback, .. } => ("Notification".to_string(), fallback.clone()),
    };

    let mut embed = json!({
        "title": clip(&title, TITLE_LIMIT),
        "description": clip(&description, LIGHTWEIGHT_LIMIT),
        "color": message.tone.color(),
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let Some(url) = &message.url {
        embed["url"] = json!(url);
    }

    let mut payload = json!({
        "username": config.username.as_deref().unwrap_or(DEFAULT_USERNAME),
        "embeds": [embed],
    });
    if let Some(avatar_url) = &config.avatar_url {
        payload["avatar_url"] = json!(avatar_url);
    }

    payload
}

pub(crate) async fn send(
    client: &reqwest::Client,
    config: &DiscordConfig,
    message: &FormattedMessage,
) -> Attempt {
    match client
        .post(&config.webhook_url)
        .json(&payload(config, message))
        .send()
        .await
    {
        // Discord answers 204 No Content, or 200 when `?wait=true` is set
        Ok(response) if matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) => {
            Attempt::delivered(response.status())
        }
        Ok(response) => {
            let status = response.status();
            Attempt::http_error(status, &response_text(response).await)
        }
        Err(e) => Attempt::transport(&e, "Discord"),
    }
}
