//! Shared-secret verification of inbound webhooks.
//!
//! GitHub and Bitbucket sign the raw body with HMAC-SHA256 and send
//! `sha256=<hex>`; GitLab echoes the configured secret in `X-Gitlab-Token`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::PipelineError;
use crate::ingest::{Platform, WebhookHeaders};

type HmacSha256 = Hmac<Sha256>;

pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const BITBUCKET_SIGNATURE_HEADER: &str = "x-hub-signature";
pub const GITLAB_TOKEN_HEADER: &str = "x-gitlab-token";

/// Verifies the request against `secret`
pub fn verify(
    platform: Platform,
    headers: &WebhookHeaders,
    body: &[u8],
    secret: &str,
) -> Result<(), PipelineError> {
    match platform {
        Platform::Github => verify_hmac(headers, GITHUB_SIGNATURE_HEADER, body, secret),
        Platform::Bitbucket => verify_hmac(headers, BITBUCKET_SIGNATURE_HEADER, body, secret),
        Platform::Gitlab => verify_token(headers, secret),
    }
}

/// Computes the `sha256=<hex>` signature for a body
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = new_mac(secret.as_bytes());
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC can take key of any size")
}

fn verify_hmac(
    headers: &WebhookHeaders,
    header: &str,
    body: &[u8],
    secret: &str,
) -> Result<(), PipelineError> {
    let value = headers
        .get(header)
        .ok_or_else(|| PipelineError::InvalidSignature(format!("missing {} header", header)))?;

    let hex_signature = value.strip_prefix("sha256=").ok_or_else(|| {
        PipelineError::InvalidSignature("only sha256 signatures are supported".to_string())
    })?;

    let signature = hex::decode(hex_signature.trim())
        .map_err(|_| PipelineError::InvalidSignature("signature is not valid hex".to_string()))?;

    let mut mac = new_mac(secret.as_bytes());
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| PipelineError::InvalidSignature("signature mismatch".to_string()))
}

fn verify_token(headers: &WebhookHeaders, secret: &str) -> Result<(), PipelineError> {
    let token = headers.get(GITLAB_TOKEN_HEADER).ok_or_else(|| {
        PipelineError::InvalidSignature(format!("missing {} header", GITLAB_TOKEN_HEADER))
    })?;

    // Both MACs share a key, so equal outputs mean equal tokens, and
    // verify_slice compares in constant time
    let mut expected = new_mac(secret.as_bytes());
    expected.update(secret.as_bytes());
    let expected = expected.finalize().into_bytes();

    let mut actual = new_mac(secret.as_bytes());
    actual.update(token.as_bytes());
    actual
        .verify_slice(&expected)
        .map_err(|_| PipelineError::InvalidSignature("token mismatch".to_string()))
}
