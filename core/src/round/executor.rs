//! Round execution: one bounded fan-out over all targets

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{ApiToken, SessionConfig};
use crate::reading::Reading;
use crate::state::{RoundId, SamplingState};
use crate::target::Target;
use crate::traits::{FetchError, TargetFetcher};

use super::rate_limiter::FetchRateLimiter;
use super::stats::RoundStats;

/// Result of one fetch task
enum FetchOutcome {
    Value(f64),
    Empty,
    Failed(FetchError),
}

/// Everything a finished round hands back to the session
#[derive(Debug)]
pub struct RoundOutcome {
    /// Round that produced this outcome
    pub round: RoundId,

    /// Readings collected, in completion order
    pub readings: Vec<Reading>,

    /// Fetch statistics
    pub stats: RoundStats,
}

impl RoundOutcome {
    /// `Done` if anything was collected, `Failed` otherwise
    pub fn state(&self) -> SamplingState {
        if self.readings.is_empty() {
            SamplingState::Failed
        } else {
            SamplingState::Done
        }
    }
}

/// Runs sampling rounds
///
/// Each round fetches every target once with at most `pool_size` fetches in
/// flight. A failing, empty, or slow target only loses its own sample.
pub struct RoundExecutor {
    /// Fetcher (shared across rounds via Arc)
    fetcher: Arc<dyn TargetFetcher>,

    /// Maximum fetches in flight per round
    pool_size: usize,

    /// Per-fetch deadline
    fetch_timeout: Duration,

    /// Throttle shared by all rounds
    rate_limiter: Arc<FetchRateLimiter>,
}

impl RoundExecutor {
    /// Create a new executor
    pub fn new(
        fetcher: Arc<dyn TargetFetcher>,
        pool_size: usize,
        fetch_timeout: Duration,
        rate_limiter: FetchRateLimiter,
    ) -> Self {
        Self {
            fetcher,
            pool_size: pool_size.max(1),
            fetch_timeout,
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    /// Create an executor from a session config
    pub fn from_config(fetcher: Arc<dyn TargetFetcher>, config: &SessionConfig) -> Self {
        Self::new(
            fetcher,
            config.pool_size,
            config.fetch_timeout,
            FetchRateLimiter::new(config.fetch_rate_limit),
        )
    }

    /// Pool size
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Run one round over `targets`
    ///
    /// Never fails: the outcome's [`RoundOutcome::state`] tells whether the
    /// round collected anything.
    pub async fn execute(
        &self,
        round: RoundId,
        targets: Arc<[Target]>,
        token: ApiToken,
    ) -> RoundOutcome {
        let mut stats = RoundStats::new();
        stats.start();

        tracing::debug!(
            round = %round,
            targets = targets.len(),
            pool_size = self.pool_size,
            "Round started"
        );

        let pool = Arc::new(Semaphore::new(self.pool_size));
        let mut fetches = JoinSet::new();

        for target in targets.iter().copied() {
            // Wait for a free slot before spawning, so at most `pool_size`
            // fetch tasks exist at once. The semaphore is never closed.
            let Ok(permit) = Arc::clone(&pool).acquire_owned().await else {
                break;
            };

            let fetcher = Arc::clone(&self.fetcher);
            let limiter = Arc::clone(&self.rate_limiter);
            let token = token.clone();
            let timeout = self.fetch_timeout;

            fetches.spawn(async move {
                let _permit = permit;
                limiter.wait().await;

                let outcome = match tokio::time::timeout(timeout, fetcher.fetch(&target, &token))
                    .await
                {
                    Ok(Ok(Some(value))) if value.is_finite() => FetchOutcome::Value(value),
                    Ok(Ok(_)) => FetchOutcome::Empty,
                    Ok(Err(e)) => FetchOutcome::Failed(e),
                    Err(_) => FetchOutcome::Failed(FetchError::Timeout(timeout)),
                };
                (target, outcome)
            });
        }

        let mut readings = Vec::with_capacity(targets.len());
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((target, FetchOutcome::Value(value))) => {
                    stats.record_reading();
                    readings.push(Reading::new(round, target, value));
                }
                Ok((target, FetchOutcome::Empty)) => {
                    stats.record_empty();
                    tracing::debug!(round = %round, target = %target, "Target returned no value");
                }
                Ok((target, FetchOutcome::Failed(FetchError::Timeout(after)))) => {
                    stats.record_timeout();
                    tracing::warn!(
                        round = %round,
                        target = %target,
                        timeout_ms = after.as_millis() as u64,
                        "Fetch timed out"
                    );
                }
                Ok((target, FetchOutcome::Failed(e))) => {
                    stats.record_failure();
                    tracing::warn!(
                        round = %round,
                        target = %target,
                        kind = e.kind(),
                        error = %e,
                        "Fetch failed"
                    );
                }
                Err(e) => {
                    stats.record_failure();
                    tracing::warn!(round = %round, error = %e, "Fetch task panicked");
                }
            }
        }

        stats.stop();
        let outcome = RoundOutcome {
            round,
            readings,
            stats,
        };

        tracing::debug!(
            round = %round,
            state = %outcome.state(),
            collected = outcome.stats.collected,
            dropped = outcome.stats.dropped(),
            yield_rate = outcome.stats.yield_rate(),
            elapsed_ms = ?outcome.stats.elapsed().map(|d| d.as_millis()),
            "Round finished"
        );

        outcome
    }
}

impl std::fmt::Debug for RoundExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundExecutor")
            .field("fetcher", &self.fetcher.name())
            .field("pool_size", &self.pool_size)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}
