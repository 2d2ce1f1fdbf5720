//! Round execution
//!
//! A round is the unit the scheduler fires: **fan out -> collect -> decide**.
//!
//! 1. Every known target is fetched once, through a pool of at most
//!    `pool_size` concurrent fetch tasks
//! 2. Each fetch is bounded by the fetch timeout and, if configured, by a
//!    session-wide rate limit
//! 3. Values are kept; errors, timeouts and empty answers are dropped
//!    without retry
//! 4. The round is `Done` if at least one reading was collected, `Failed`
//!    otherwise
//!
//! # Example
//!
//! ```ignore
//! use airq_core::round::RoundExecutor;
//!
//! let executor = RoundExecutor::from_config(fetcher, &config);
//! let outcome = executor.execute(RoundId(0), targets, token).await;
//! println!("{}: {} readings", outcome.state(), outcome.readings.len());
//! ```

mod executor;
mod rate_limiter;
mod stats;

pub use executor::{RoundExecutor, RoundOutcome};
pub use rate_limiter::FetchRateLimiter;
pub use stats::RoundStats;

#[cfg(test)]
mod tests;
