//! airq-core: Scheduling and aggregation for air-quality sampling sessions
//!
//! This crate provides everything a sampling campaign needs apart from the
//! remote service itself, including:
//!
//! - Session configuration and the round schedule
//! - Core traits (TargetDiscovery, TargetFetcher)
//! - Bounded, rate-limited round execution
//! - Round/session state folding and the reading store
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod reading;
pub mod round;
pub mod schedule;
pub mod session;
pub mod state;
pub mod target;
pub mod traits;

pub use config::{
    ApiToken, ConfigError, SessionConfig, DEFAULT_POOL_SIZE, MAX_FETCH_RATE_LIMIT,
    MAX_RATE_PER_MINUTE, MIN_FETCH_RATE_LIMIT,
};
pub use error::{SessionError, SessionResult};
pub use reading::Reading;
pub use round::{FetchRateLimiter, RoundExecutor, RoundOutcome, RoundStats};
pub use schedule::Schedule;
pub use session::{RoundSnapshot, SamplingSession, SessionBuilder, SessionSnapshot, StateAggregator};
pub use state::{RoundId, SamplingState};
pub use target::{Bounds, Target};
pub use traits::{BoxError, DiscoveryError, FetchError, TargetDiscovery, TargetFetcher};
