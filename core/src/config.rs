//! Session configuration types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::target::Bounds;

/// Default number of concurrent fetches per round
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Rates above one sample per second would truncate the interval to zero
pub const MAX_RATE_PER_MINUTE: u32 = 60;

/// Slowest accepted fetch throttle: one fetch every 1000 seconds
pub const MIN_FETCH_RATE_LIMIT: f64 = 0.001;

/// Fastest accepted fetch throttle (fetches per second)
pub const MAX_FETCH_RATE_LIMIT: f64 = 10_000.0;

/// Sampling session configuration
///
/// `period_minutes` is the total span of the session and `rate_per_minute`
/// the number of rounds fired per minute inside it.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Region in which targets are discovered
    pub bounds: Bounds,

    /// Total sampling span in minutes
    #[serde(default = "default_period_minutes")]
    pub period_minutes: u32,

    /// Rounds per minute
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: u32,

    /// Maximum concurrent fetches inside one round
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// API credential; may also be supplied later with `set_token`
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// A fetch running longer than this counts as a dropped sample
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Optional cap on fetches per second across all rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_rate_limit: Option<f64>,

    /// Extra time a blocking start waits past the sampling period
    #[serde(default = "default_completion_grace", with = "humantime_serde")]
    pub completion_grace: Duration,
}

fn default_period_minutes() -> u32 {
    5
}

fn default_rate_per_minute() -> u32 {
    1
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_completion_grace() -> Duration {
    Duration::from_secs(5)
}

impl SessionConfig {
    /// Create a config for the given region with default cadence
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            period_minutes: default_period_minutes(),
            rate_per_minute: default_rate_per_minute(),
            pool_size: default_pool_size(),
            token: None,
            fetch_timeout: default_fetch_timeout(),
            fetch_rate_limit: None,
            completion_grace: default_completion_grace(),
        }
    }

    /// Set the sampling period (minutes)
    pub fn with_period_minutes(mut self, minutes: u32) -> Self {
        self.period_minutes = minutes;
        self
    }

    /// Set the sampling rate (rounds per minute)
    pub fn with_rate_per_minute(mut self, rate: u32) -> Self {
        self.rate_per_minute = rate;
        self
    }

    /// Set the worker pool size
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the API token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the per-fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the fetch rate limit (fetches per second)
    pub fn with_fetch_rate_limit(mut self, per_second: f64) -> Self {
        self.fetch_rate_limit = Some(per_second);
        self
    }

    /// Set the grace period added to a blocking start
    pub fn with_completion_grace(mut self, grace: Duration) -> Self {
        self.completion_grace = grace;
        self
    }

    /// Upper bound on how long a blocking start waits for its rounds
    pub fn blocking_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.period_minutes) * 60) + self.completion_grace
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;

        if self.period_minutes == 0 {
            return Err(ConfigError::InvalidPeriod(
                "period must be at least 1 minute".into(),
            ));
        }

        if self.rate_per_minute == 0 {
            return Err(ConfigError::InvalidRate(
                "rate must be at least 1 sample per minute".into(),
            ));
        }

        if self.rate_per_minute > MAX_RATE_PER_MINUTE {
            return Err(ConfigError::InvalidRate(format!(
                "rate must not exceed {MAX_RATE_PER_MINUTE} samples per minute"
            )));
        }

        if self.pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize(
                "pool size must be at least 1".into(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "fetch timeout must be positive".into(),
            ));
        }

        if let Some(rps) = self.fetch_rate_limit {
            if !rps.is_finite() || rps <= 0.0 {
                return Err(ConfigError::InvalidRateLimit(
                    "fetch rate limit must be positive".into(),
                ));
            }
            if !(MIN_FETCH_RATE_LIMIT..=MAX_FETCH_RATE_LIMIT).contains(&rps) {
                return Err(ConfigError::InvalidRateLimit(format!(
                    "fetch rate limit must be between {MIN_FETCH_RATE_LIMIT} and {MAX_FETCH_RATE_LIMIT} per second, got {rps}"
                )));
            }
        }

        if let Some(token) = &self.token {
            ApiToken::parse(token.as_str())?;
        }

        Ok(())
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("bounds", &self.bounds)
            .field("period_minutes", &self.period_minutes)
            .field("rate_per_minute", &self.rate_per_minute)
            .field("pool_size", &self.pool_size)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("fetch_timeout", &self.fetch_timeout)
            .field("fetch_rate_limit", &self.fetch_rate_limit)
            .field("completion_grace", &self.completion_grace)
            .finish()
    }
}

/// API credential
///
/// Validated on construction; `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Parse a raw token
    ///
    /// Rejects empty tokens and tokens containing whitespace or control
    /// characters, since the token is embedded in request URLs.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ConfigError::InvalidToken(
                "token must not contain whitespace or control characters".into(),
            ));
        }
        Ok(Self(raw))
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid sampling period
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Invalid sampling rate
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Invalid worker pool size
    #[error("Invalid pool size: {0}")]
    InvalidPoolSize(String),

    /// Invalid bounding box
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Invalid timeout
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    /// Invalid fetch rate limit
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// No token has been set
    #[error("API token is not set")]
    MissingToken,

    /// Token is present but malformed
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}
