//! Outbound delivery to chat destinations.
//!
//! [`Notifier`] owns the HTTP client and retry policy; each destination type
//! has a sender module that builds the request body and decides what counts
//! as success for that service. Senders never return errors: every outcome
//! is folded into a [`DeliveryResult`].

pub mod discord;
pub mod mattermost;
pub mod slack;
pub mod telegram;

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

use crate::config::{DispatchConfig, RetryConfig};
use crate::error::DeliveryError;
use crate::format::{Block, FormattedMessage, MessageBody, Tone, WireFamily};
use crate::ingest::parser::truncate;
use crate::models::delivery::MAX_ERROR_BODY;
use crate::models::{Destination, DestinationConfig, DeliveryResult};

// =============================================================================
// Attempt Outcome
// =============================================================================

/// Result of a single HTTP attempt
#[derive(Debug)]
pub(crate) enum Attempt {
    Delivered {
        http_status: Option<u16>,
    },
    Failed {
        error: DeliveryError,
        http_status: Option<u16>,
        /// Transport errors, 429 and 5xx are worth another try
        retryable: bool,
    },
}

impl Attempt {
    pub fn delivered(status: StatusCode) -> Self {
        Attempt::Delivered {
            http_status: Some(status.as_u16()),
        }
    }

    /// Non-success HTTP response
    pub fn http_error(status: StatusCode, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), truncate(body, MAX_ERROR_BODY))
        };
        Attempt::Failed {
            error: DeliveryError::Failure(detail),
            http_status: Some(status.as_u16()),
            retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        }
    }

    /// 2xx response whose body reports a failure
    pub fn rejected(status: StatusCode, detail: String) -> Self {
        Attempt::Failed {
            error: DeliveryError::Failure(truncate(&detail, MAX_ERROR_BODY)),
            http_status: Some(status.as_u16()),
            retryable: false,
        }
    }

    /// Request never produced a response.
    ///
    /// Only the error class is kept: reqwest's message embeds the request
    /// URL, and Telegram URLs carry the bot token.
    pub fn transport(error: &reqwest::Error, service: &str) -> Self {
        let detail = if error.is_timeout() {
            format!("Request to {} timed out", service)
        } else if error.is_connect() {
            format!("Connection to {} failed", service)
        } else if error.is_redirect() {
            format!("{} request failed: too many redirects", service)
        } else if error.is_body() || error.is_decode() {
            format!("{} request failed: invalid response", service)
        } else {
            format!("{} request failed", service)
        };
        Attempt::Failed {
            error: DeliveryError::Failure(detail),
            http_status: None,
            retryable: true,
        }
    }
}

/// Reads a response body for diagnostics, tolerating decode failures
pub(crate) async fn response_text(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

// =============================================================================
// Notifier
// =============================================================================

/// Sends formatted messages to destinations with retry
#[derive(Debug, Clone)]
pub struct Notifier {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Notifier {
    /// Creates a notifier whose client applies the configured request timeout
    pub fn new(dispatch: &DispatchConfig, retry: RetryConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(dispatch.http_timeout)
            .user_agent(concat!("gitrelay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, retry })
    }

    /// Creates a notifier around an existing client
    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Delivers a message to one destination
    pub async fn send(&self, destination: &Destination, message: &FormattedMessage) -> DeliveryResult {
        let result = self.deliver(&destination.config, message).await;

        if result.is_success() {
            log::info!(
                "Delivered to destination {} ({}) after {} attempt(s)",
                destination.id,
                destination.destination_type(),
                result.attempts
            );
        } else {
            log::warn!(
                "Delivery to destination {} ({}) failed: {}",
                destination.id,
                destination.destination_type(),
                result.error_detail.as_deref().unwrap_or("unknown error")
            );
        }

        result.for_destination(destination)
    }

    /// Sends a synthetic message through the normal delivery path
    pub async fn test_connection(&self, config: &DestinationConfig) -> DeliveryResult {
        let message = test_message(config.destination_type().family());
        self.deliver(config, &message).await
    }

    async fn deliver(&self, config: &DestinationConfig, message: &FormattedMessage) -> DeliveryResult {
        if let Err(e) = preflight(config) {
            return DeliveryResult::failure(&DeliveryError::Config(e), None, 0);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match config {
                DestinationConfig::Telegram(c) => telegram::send(&self.client, c, message).await,
                DestinationConfig::Slack(c) => slack::send(&self.client, c, message).await,
                DestinationConfig::Mattermost(c) => mattermost::send(&self.client, c, message).await,
                DestinationConfig::Discord(c) => discord::send(&self.client, c, message).await,
            };

            match outcome {
                Attempt::Delivered { http_status } => {
                    return DeliveryResult::success(http_status, attempt);
                }
                Attempt::Failed {
                    error,
                    http_status,
                    retryable,
                } => {
                    if !retryable || attempt >= max_attempts {
                        return DeliveryResult::failure(&error, http_status, attempt);
                    }

                    let delay = backoff_delay(&self.retry, attempt);
                    log::debug!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        max_attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Structural checks every sender needs. Host allow-lists are applied
/// when destinations are loaded, not here.
fn preflight(config: &DestinationConfig) -> Result<(), crate::models::InvalidConfig> {
    use crate::models::destination::parse_http_url;
    use crate::models::InvalidConfig;

    match config {
        DestinationConfig::Telegram(c) => {
            if c.bot_token.trim().is_empty() || c.chat_id.trim().is_empty() {
                return Err(InvalidConfig::new("Telegram bot token and chat id are required"));
            }
            parse_http_url(c.api_url(), "Telegram API").map(|_| ())
        }
        DestinationConfig::Slack(c) => parse_http_url(&c.webhook_url, "Slack webhook").map(|_| ()),
        DestinationConfig::Mattermost(c) => {
            parse_http_url(&c.webhook_url, "Mattermost webhook").map(|_| ())
        }
        DestinationConfig::Discord(c) => {
            parse_http_url(&c.webhook_url, "Discord webhook").map(|_| ())
        }
    }
}

/// Exponential backoff with up to 25% random jitter, capped at `max_delay`
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = retry
        .initial_delay
        .saturating_mul(1u32 << exponent)
        .min(retry.max_delay);

    let jitter_ms = (base.as_millis() as u64) / 4;
    let jitter = if jitter_ms > 0 {
        Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    } else {
        Duration::ZERO
    };

    (base + jitter).min(retry.max_delay)
}

/// Minimal message used by connectivity self-tests
pub fn test_message(family: WireFamily) -> FormattedMessage {
    const TITLE: &str = "✅ Connection test";
    const TEXT: &str = "This destination is configured correctly.";

    let body = match family {
        WireFamily::RichMarkup => MessageBody::Html {
            text: format!("<b>{}</b>\n\n{}", TITLE, TEXT),
        },
        WireFamily::Lightweight => MessageBody::Markdown {
            title: TITLE.to_string(),
            body: TEXT.to_string(),
        },
        WireFamily::StructuredBlocks => MessageBody::Blocks {
            blocks: vec![
                Block::Header {
                    text: TITLE.to_string(),
                },
                Block::Section {
                    text: TEXT.to_string(),
                },
            ],
            fallback: format!("{}: {}", TITLE, TEXT),
        },
    };

    FormattedMessage {
        body,
        tone: Tone::Success,
        url: None,
    }
}
