//! Builder pattern for SamplingSession construction

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ApiToken, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::round::RoundExecutor;
use crate::schedule::Schedule;
use crate::target::Bounds;
use crate::traits::{TargetDiscovery, TargetFetcher};

use super::controller::SamplingSession;

/// Builder for creating a SamplingSession with validated configuration
///
/// # Example
///
/// ```ignore
/// let session = SessionBuilder::new(bounds)
///     .period_minutes(1)
///     .rate_per_minute(5)
///     .token("my-token")
///     .discovery(client.clone())
///     .fetcher(client)
///     .build()?;
/// ```
pub struct SessionBuilder {
    config: SessionConfig,
    discovery: Option<Arc<dyn TargetDiscovery>>,
    fetcher: Option<Arc<dyn TargetFetcher>>,
}

impl SessionBuilder {
    /// Create a builder for `bounds` with default configuration
    pub fn new(bounds: Bounds) -> Self {
        Self::from_config(SessionConfig::new(bounds))
    }

    /// Create a builder from a full configuration
    pub fn from_config(config: SessionConfig) -> Self {
        Self {
            config,
            discovery: None,
            fetcher: None,
        }
    }

    /// Set the sampling period (minutes)
    pub fn period_minutes(mut self, minutes: u32) -> Self {
        self.config.period_minutes = minutes;
        self
    }

    /// Set the sampling rate (rounds per minute)
    pub fn rate_per_minute(mut self, rate: u32) -> Self {
        self.config.rate_per_minute = rate;
        self
    }

    /// Set the worker pool size
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    /// Set the API token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Set the per-fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Set the fetch rate limit (fetches per second)
    pub fn fetch_rate_limit(mut self, per_second: Option<f64>) -> Self {
        self.config.fetch_rate_limit = per_second;
        self
    }

    /// Set the extra wait granted to a blocking start
    pub fn completion_grace(mut self, grace: Duration) -> Self {
        self.config.completion_grace = grace;
        self
    }

    /// Set the target discovery
    pub fn discovery(mut self, discovery: Arc<dyn TargetDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Set the target fetcher
    pub fn fetcher(mut self, fetcher: Arc<dyn TargetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Build the session
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or fetcher are not set, or if
    /// configuration validation fails. No round is armed in either case.
    pub fn build(self) -> SessionResult<SamplingSession> {
        let discovery = self
            .discovery
            .ok_or_else(|| SessionError::missing("discovery"))?;

        let fetcher = self
            .fetcher
            .ok_or_else(|| SessionError::missing("fetcher"))?;

        self.config.validate()?;
        let schedule = Schedule::from_config(&self.config)?;
        let token = self.config.token.clone().map(ApiToken::parse).transpose()?;

        let executor = RoundExecutor::from_config(fetcher, &self.config);
        Ok(SamplingSession::new(
            self.config,
            schedule,
            discovery,
            executor,
            token,
        ))
    }
}
