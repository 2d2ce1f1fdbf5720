//! Optional throttle on outgoing fetches

use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};

use crate::config::{MAX_FETCH_RATE_LIMIT, MIN_FETCH_RATE_LIMIT};

/// Fetch throttle using the governor token bucket
///
/// One instance is shared by every round of a session, so the cap holds even
/// when rounds overlap. Fractional rates are supported: `0.5` allows one fetch
/// every two seconds.
pub struct FetchRateLimiter {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    per_second: Option<f64>,
}

impl FetchRateLimiter {
    /// Create a limiter allowing `per_second` fetches per second
    ///
    /// `None`, zero, negative or non-finite rates disable limiting. Other
    /// rates are clamped to the range `SessionConfig::validate` accepts.
    pub fn new(per_second: Option<f64>) -> Self {
        let limiter = per_second
            .filter(|rps| rps.is_finite() && *rps > 0.0)
            .map(|rps| rps.clamp(MIN_FETCH_RATE_LIMIT, MAX_FETCH_RATE_LIMIT))
            .and_then(|rps| Quota::with_period(Duration::from_secs_f64(1.0 / rps)))
            .map(RateLimiter::direct);

        Self {
            limiter,
            per_second,
        }
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Wait for a fetch slot
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Check if limiting is active
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Configured fetches per second
    pub fn per_second(&self) -> Option<f64> {
        self.per_second
    }
}

impl Default for FetchRateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl std::fmt::Debug for FetchRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRateLimiter")
            .field("per_second", &self.per_second)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let limiter = FetchRateLimiter::default();
        assert!(!limiter.is_enabled());
        assert!(limiter.per_second().is_none());
    }

    #[test]
    fn test_non_positive_rates_disable() {
        assert!(!FetchRateLimiter::new(Some(0.0)).is_enabled());
        assert!(!FetchRateLimiter::new(Some(-3.0)).is_enabled());
        assert!(!FetchRateLimiter::new(Some(f64::NAN)).is_enabled());
    }

    #[test]
    fn test_fractional_rate_enabled() {
        let limiter = FetchRateLimiter::new(Some(0.5));
        assert!(limiter.is_enabled());
        assert_eq!(limiter.per_second(), Some(0.5));
    }

    #[test]
    fn test_extreme_rates_stay_enabled() {
        assert!(FetchRateLimiter::new(Some(1e-20)).is_enabled());
        assert!(FetchRateLimiter::new(Some(MIN_FETCH_RATE_LIMIT)).is_enabled());
        assert!(FetchRateLimiter::new(Some(MAX_FETCH_RATE_LIMIT)).is_enabled());
        assert!(FetchRateLimiter::new(Some(1e10)).is_enabled());
    }

    #[tokio::test]
    async fn test_waits_between_fetches() {
        // governor runs on the wall clock, not tokio's
        let limiter = FetchRateLimiter::new(Some(20.0));
        let start = std::time::Instant::now();
        for _ in 0..3 {
            limiter.wait().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_first_fetch_is_immediate() {
        let limiter = FetchRateLimiter::new(Some(100.0));
        limiter.wait().await;
        FetchRateLimiter::unlimited().wait().await;
    }

    #[test]
    fn test_debug() {
        let debug = format!("{:?}", FetchRateLimiter::new(Some(20.0)));
        assert!(debug.contains("FetchRateLimiter"));
        assert!(debug.contains("20.0"));
        assert!(debug.contains("true"));
    }
}
