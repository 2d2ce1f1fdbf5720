//! Round schedule and deferred round tasks
//!
//! A [`Schedule`] turns `(period, rate)` into round trigger offsets. Each
//! offset is armed as its own tokio task that sleeps on the runtime's timer
//! wheel until the offset elapses, racing a per-round [`CancellationToken`].
//! Cancellation only wins before the round fires: once the sleep completes,
//! the round body runs to completion.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, SessionConfig, MAX_RATE_PER_MINUTE};

/// Offsets of every round in a session
///
/// The interval is `60 / rate` whole seconds. When `rate` does not divide 60
/// the interval is truncated, and the round count stays
/// `floor(period * 60 / interval)`, so the rounds end before the full period
/// has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    period: Duration,
    interval: Duration,
}

impl Schedule {
    /// Build a schedule for `period_minutes` at `rate_per_minute` rounds per minute
    pub fn new(period_minutes: u32, rate_per_minute: u32) -> Result<Self, ConfigError> {
        if rate_per_minute == 0 || rate_per_minute > MAX_RATE_PER_MINUTE {
            return Err(ConfigError::InvalidRate(format!(
                "rate must be between 1 and {MAX_RATE_PER_MINUTE}, got {rate_per_minute}"
            )));
        }
        if period_minutes == 0 {
            return Err(ConfigError::InvalidPeriod(
                "period must be at least 1 minute".into(),
            ));
        }

        Ok(Self {
            period: Duration::from_secs(u64::from(period_minutes) * 60),
            interval: Duration::from_secs(u64::from(60 / rate_per_minute)),
        })
    }

    /// Build the schedule described by a session config
    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        Self::new(config.period_minutes, config.rate_per_minute)
    }

    /// Total sampling span
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Gap between consecutive rounds
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of rounds
    pub fn round_count(&self) -> usize {
        (self.period.as_secs() / self.interval.as_secs()) as usize
    }

    /// Trigger offsets from session start, strictly increasing
    pub fn offsets(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.round_count()).map(move |i| self.interval * i as u32)
    }
}

/// Spawn a deferred round
///
/// `fire` runs once `origin + offset` is reached unless `cancel` is triggered
/// first. Returns immediately; the returned handle completes when the round
/// body finishes, or right after cancellation.
pub(crate) fn arm<F, Fut>(
    origin: Instant,
    offset: Duration,
    cancel: CancellationToken,
    fire: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {}

            _ = tokio::time::sleep_until(origin + offset) => fire().await,
        }
    })
}
