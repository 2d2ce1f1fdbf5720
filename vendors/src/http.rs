//! HTTP client configuration

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while setting up a vendor client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A timeout value is out of acceptable range.
    #[error("invalid timeout: {0:?}")]
    InvalidTimeout(Duration),

    /// The base URL is not an absolute http(s) URL.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Connection timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Idle connection timeout
    #[serde(default = "default_pool_idle_timeout", with = "humantime_serde")]
    pub pool_idle_timeout: Duration,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_pool_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_user_agent() -> String {
    format!("airq-sampler/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            pool_idle_timeout: default_pool_idle_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ClientError> {
        // 1s to 5m for request, 1s to 1m for connect
        if self.request_timeout < Duration::from_secs(1)
            || self.request_timeout > Duration::from_secs(300)
        {
            return Err(ClientError::InvalidTimeout(self.request_timeout));
        }
        if self.connect_timeout < Duration::from_secs(1)
            || self.connect_timeout > Duration::from_secs(60)
        {
            return Err(ClientError::InvalidTimeout(self.connect_timeout));
        }
        Ok(())
    }

    /// Build a reqwest client from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the client cannot be built.
    pub fn build_client(&self) -> Result<Client, ClientError> {
        self.validate()?;

        let client = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .user_agent(&self.user_agent)
            .build()?;

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HttpConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.user_agent.starts_with("airq-sampler/"));
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(matches!(
            HttpConfig::default()
                .with_request_timeout(Duration::ZERO)
                .validate(),
            Err(ClientError::InvalidTimeout(_))
        ));
        assert!(HttpConfig::default()
            .with_request_timeout(Duration::from_secs(600))
            .validate()
            .is_err());
        assert!(HttpConfig::default()
            .with_connect_timeout(Duration::from_secs(120))
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: HttpConfig =
            serde_json::from_str(r#"{"request_timeout": "30s"}"#).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_client() {
        assert!(HttpConfig::default().build_client().is_ok());
        assert!(HttpConfig::default()
            .with_connect_timeout(Duration::ZERO)
            .build_client()
            .is_err());
    }
}
