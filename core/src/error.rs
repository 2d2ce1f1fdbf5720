//! Error types for airq-core
//!
//! Remote failures (discovery, fetch) never show up here: they surface through
//! round and session state. `SessionError` only covers misuse of the API and
//! configuration that cannot be accepted.

use thiserror::Error;

use crate::config::ConfigError;

/// Session lifecycle error
#[derive(Error, Debug)]
pub enum SessionError {
    /// Configuration rejected at construction or when setting the token
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required collaborator was not supplied to the builder
    #[error("missing required component: {0}")]
    MissingComponent(&'static str),

    /// `start` was called while rounds from a previous run are still registered
    #[error("session already started ({rounds} rounds registered); call stop() or reset() first")]
    AlreadyStarted {
        /// Rounds still held by the session
        rounds: usize,
    },
}

impl SessionError {
    /// Create a missing component error
    pub fn missing(component: &'static str) -> Self {
        Self::MissingComponent(component)
    }
}

/// Result type alias
pub type SessionResult<T> = std::result::Result<T, SessionError>;
