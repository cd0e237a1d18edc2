//! Unit tests for configuration parsing
//!
//! Note: These tests modify global environment variables and must run serially.

use std::time::Duration;

use gitrelay::config::{Config, DispatchConfig, RetryConfig, SecurityConfig};
use serial_test::serial;

const DISPATCH_VARS: [&str; 4] = [
    "HTTP_TIMEOUT_SECS",
    "DELIVERY_TIMEOUT_SECS",
    "DISPATCH_MAX_CONCURRENCY",
    "MAX_DISPLAYED_COMMITS",
];

const RETRY_VARS: [&str; 3] = [
    "RETRY_MAX_ATTEMPTS",
    "RETRY_INITIAL_DELAY_MS",
    "RETRY_MAX_DELAY_MS",
];

fn clear(vars: &[&str]) {
    for var in vars {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_dispatch_config_defaults() {
    clear(&DISPATCH_VARS);

    let config = DispatchConfig::from_env();

    assert_eq!(config.http_timeout, Duration::from_secs(5));
    assert_eq!(config.delivery_timeout, Duration::from_secs(15));
    assert_eq!(config.max_concurrency, 8);
    assert_eq!(config.max_displayed_commits, 3);
}

#[test]
#[serial]
fn test_dispatch_config_custom_values() {
    std::env::set_var("HTTP_TIMEOUT_SECS", "2");
    std::env::set_var("DELIVERY_TIMEOUT_SECS", "30");
    std::env::set_var("DISPATCH_MAX_CONCURRENCY", "0");
    std::env::set_var("MAX_DISPLAYED_COMMITS", "5");

    let config = DispatchConfig::from_env();

    assert_eq!(config.http_timeout, Duration::from_secs(2));
    assert_eq!(config.delivery_timeout, Duration::from_secs(30));
    // Zero would stall the fan-out
    assert_eq!(config.max_concurrency, 1);
    assert_eq!(config.max_displayed_commits, 5);

    clear(&DISPATCH_VARS);
}

#[test]
#[serial]
fn test_retry_config_invalid_values_use_defaults() {
    std::env::set_var("RETRY_MAX_ATTEMPTS", "many");
    std::env::set_var("RETRY_INITIAL_DELAY_MS", "-5");

    let config = RetryConfig::from_env();

    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.initial_delay, Duration::from_millis(500));
    assert_eq!(config.max_delay, Duration::from_millis(5000));

    clear(&RETRY_VARS);
}

#[test]
#[serial]
fn test_empty_webhook_secret_is_unset() {
    std::env::set_var("WEBHOOK_SECRET", "");
    assert!(SecurityConfig::from_env().webhook_secret.is_none());

    std::env::set_var("WEBHOOK_SECRET", "s3cret");
    assert_eq!(
        SecurityConfig::from_env().webhook_secret.as_deref(),
        Some("s3cret")
    );

    std::env::remove_var("WEBHOOK_SECRET");
}

#[test]
#[serial]
fn test_missing_database_url_is_an_error() {
    let previous = std::env::var("DATABASE_URL").ok();
    std::env::remove_var("DATABASE_URL");

    let result = Config::from_env();
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().to_string(),
        "DATABASE_URL environment variable is required"
    );

    if let Some(url) = previous {
        std::env::set_var("DATABASE_URL", url);
    }
}

#[test]
#[serial]
fn test_invalid_port_is_an_error() {
    std::env::set_var("DATABASE_URL", "postgres://localhost/gitrelay");
    std::env::set_var("PORT", "eighty");

    assert!(Config::from_env().is_err());

    std::env::remove_var("PORT");
    let config = Config::from_env().unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.max_payload_bytes, 1024 * 1024);

    std::env::remove_var("DATABASE_URL");
}
