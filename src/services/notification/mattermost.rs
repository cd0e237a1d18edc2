//! Mattermost incoming webhook sender.

use serde_json::{json, Value};

use super::{response_text, Attempt};
use crate::format::{FormattedMessage, MessageBody};
use crate::models::MattermostConfig;

/// Builds the webhook request body
pub fn payload(config: &MattermostConfig, message: &FormattedMessage) -> Value {
    let text = match &message.body {
        MessageBody::Markdown { title, body } => format!("#### {}\n{}", title, body),
        MessageBody::Html { text } => text.clone(),
        MessageBody::Blocks { fallback, .. } => fallback.clone(),
    };

    let mut payload = json!({ "text": text });
    if let Some(channel) = &config.channel {
        payload["channel"] = json!(channel);
    }
    if let Some(username) = &config.username {
        payload["username"] = json!(username);
    }
    if let Some(icon_url) = &config.icon_url {
        payload["icon_url"] = json!(icon_url);
    }

    payload
}

pub(crate) async fn send(
    client: &reqwest::Client,
    config: &MattermostConfig,
    message: &FormattedMessage,
) -> Attempt {
    match client
        .post(&config.webhook_url)
        .json(&payload(config, message))
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => Attempt::delivered(response.status()),
        Ok(response) => {
            let status = response.status();
            Attempt::http_error(status, &response_text(response).await)
        }
        Err(e) => Attempt::transport(&e, "Mattermost"),
    }
}
