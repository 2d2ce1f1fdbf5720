//! Collaborator traits for target discovery and per-target fetches
//!
//! These traits are defined in core so the scheduler never depends on a
//! transport. Implementations live in their own crates (vendors/).

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ApiToken;
use crate::target::{Bounds, Target};

/// Boxed source error from a transport layer
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// Target Discovery
// ============================================================================

/// Finds the targets located inside a bounding box
///
/// Called at most once per session while its target cache is filled.
#[async_trait]
pub trait TargetDiscovery: Send + Sync {
    /// Implementation identifier (e.g., "waqi")
    fn name(&self) -> &str;

    /// Discover all targets inside `bounds`
    ///
    /// An empty vector is a valid answer and ends the session as `Done`.
    async fn discover(&self, bounds: &Bounds, token: &ApiToken)
        -> Result<Vec<Target>, DiscoveryError>;
}

/// Discovery failures; any of these fail the whole session
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Non-success HTTP status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The service answered with an error payload
    #[error("API error: {0}")]
    Api(String),

    /// The payload could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),
}

// ============================================================================
// Target Fetcher
// ============================================================================

/// Fetches one reading for one target
#[async_trait]
pub trait TargetFetcher: Send + Sync {
    /// Implementation identifier (e.g., "waqi")
    fn name(&self) -> &str;

    /// Fetch the current reading of `target`
    ///
    /// `Ok(None)` means the target answered but has no value right now.
    async fn fetch(&self, target: &Target, token: &ApiToken) -> Result<Option<f64>, FetchError>;
}

/// Single-target fetch failures; these only drop one sample
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Non-success HTTP status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The service answered with an error payload
    #[error("API error: {0}")]
    Api(String),

    /// The fetch did not finish in time
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Short classification used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Api(_) => "api",
            FetchError::Timeout(_) => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kind() {
        assert_eq!(FetchError::Status(404).kind(), "status");
        assert_eq!(FetchError::Api("Unknown station".into()).kind(), "api");
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(1)).kind(),
            "timeout"
        );
    }

    #[test]
    fn test_discovery_error_display() {
        let err = DiscoveryError::Transport("connection refused".into());
        assert_eq!(err.to_string(), "transport error: connection refused");
        assert_eq!(
            DiscoveryError::Status(503).to_string(),
            "unexpected HTTP status 503"
        );
    }
}
