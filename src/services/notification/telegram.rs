//! Telegram Bot API sender.
//!
//! Posts to `{api_url}/bot{token}/sendMessage`. The Bot API answers 200
//! with `{"ok": false, "description": ...}` for some failures, so a 2xx
//! alone is not success.

use serde_json::{json, Value};

use super::{response_text, Attempt};
use crate::format::{FormattedMessage, MessageBody};
use crate::models::TelegramConfig;

/// Builds the `sendMessage` request body
pub fn payload(config: &TelegramConfig, message: &FormattedMessage) -> Value {
    let mut payload = match &message.body {
        MessageBody::Html { text } => json!({
            "text": text,
            "parse_mode": "HTML",
        }),
        MessageBody::Markdown { title, body } => json!({
            "text": format!("{}\n\n{}", title, body),
        }),
        MessageBody::Blocks { fallback, .. } => json!({
            "text": fallback,
        }),
    };

    payload["chat_id"] = json!(config.chat_id);
    payload["disable_web_page_preview"] = json!(true);
    if let Some(thread_id) = config.thread_id {
        payload["message_thread_id"] = json!(thread_id);
    }

    payload
}

pub fn endpoint(config: &TelegramConfig) -> String {
    format!("{}/bot{}/sendMessage", config.api_url(), config.bot_token)
}

pub(crate) async fn send(
    client: &reqwest::Client,
    config: &TelegramConfig,
    message: &FormattedMessage,
) -> Attempt {
    let response = match client
        .post(endpoint(config))
        .json(&payload(config, message))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return Attempt::transport(&e, "Telegram"),
    };

    let status = response.status();
    let body = response_text(response).await;

    if !status.is_success() {
        return Attempt::http_error(status, &body);
    }

    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    if parsed["ok"].as_bool() == Some(true) {
        Attempt::delivered(status)
    } else {
        let description = parsed["description"]
            .as_str()
            .unwrap_or("response did not report ok");
        Attempt::rejected(status, format!("Telegram API error: {}", description))
    }
}
