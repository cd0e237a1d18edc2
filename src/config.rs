use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub retry: RetryConfig,
    pub security: SecurityConfig,
    /// Upper bound on the accepted webhook body size
    pub max_payload_bytes: usize,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Fan-out and formatting limits
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Timeout applied by the HTTP client to every outbound request
    pub http_timeout: Duration,
    /// Wall-clock budget for one destination, retries included
    pub delivery_timeout: Duration,
    /// Maximum number of destinations delivered to at the same time
    pub max_concurrency: usize,
    /// Number of commits rendered before the "+K more" marker
    pub max_displayed_commits: usize,
}

/// Retry policy for transient delivery failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

/// Inbound request verification
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Shared secret configured on the Git platform side. When unset,
    /// signatures are not checked.
    pub webhook_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig::from_env()?,
            dispatch: DispatchConfig::from_env(),
            retry: RetryConfig::from_env(),
            security: SecurityConfig::from_env(),
            max_payload_bytes: env_or("MAX_PAYLOAD_BYTES", 1024 * 1024),
        })
    }
}

/// Reads and parses an env var, falling back to `default` when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1),
            acquire_timeout: Duration::from_secs(env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)),
            idle_timeout: Duration::from_secs(env_or("DATABASE_IDLE_TIMEOUT_SECS", 600)),
            max_lifetime: Duration::from_secs(env_or("DATABASE_MAX_LIFETIME_SECS", 1800)),
        })
    }
}

impl DispatchConfig {
    /// Load dispatch configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            http_timeout: Duration::from_secs(env_or("HTTP_TIMEOUT_SECS", 5)),
            delivery_timeout: Duration::from_secs(env_or("DELIVERY_TIMEOUT_SECS", 15)),
            max_concurrency: env_or::<usize>("DISPATCH_MAX_CONCURRENCY", 8).max(1),
            max_displayed_commits: env_or("MAX_DISPLAYED_COMMITS", 3),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(5),
            delivery_timeout: Duration::from_secs(15),
            max_concurrency: 8,
            max_displayed_commits: 3,
        }
    }
}

impl RetryConfig {
    /// Load retry configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            max_attempts: env_or::<u32>("RETRY_MAX_ATTEMPTS", 3).max(1),
            initial_delay: Duration::from_millis(env_or("RETRY_INITIAL_DELAY_MS", 500)),
            max_delay: Duration::from_millis(env_or("RETRY_MAX_DELAY_MS", 5000)),
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl SecurityConfig {
    /// Load security configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingDatabaseUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingDatabaseUrl => {
                write!(f, "DATABASE_URL environment variable is required")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
