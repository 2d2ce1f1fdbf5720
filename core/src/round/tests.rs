//! Tests for round execution

use super::*;
use crate::config::ApiToken;
use crate::state::{RoundId, SamplingState};
use crate::target::Target;
use crate::traits::{FetchError, TargetFetcher};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Mock TargetFetcher
// ============================================================================

/// What the mock does for a given target, keyed by latitude
#[derive(Clone, Copy)]
enum Behavior {
    Value(f64),
    Empty,
    Fail,
    Hang,
    Panic,
}

struct MockFetcher {
    default: Behavior,
    overrides: Vec<(f64, Behavior)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_override(mut self, latitude: f64, behavior: Behavior) -> Self {
        self.overrides.push((latitude, behavior));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn behavior_for(&self, target: &Target) -> Behavior {
        self.overrides
            .iter()
            .find(|(lat, _)| *lat == target.latitude)
            .map(|(_, b)| *b)
            .unwrap_or(self.default)
    }
}

#[async_trait]
impl TargetFetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, target: &Target, _token: &ApiToken) -> Result<Option<f64>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.behavior_for(target) {
            Behavior::Value(v) => Ok(Some(v)),
            Behavior::Empty => Ok(None),
            Behavior::Fail => Err(FetchError::Status(500)),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Panic => panic!("simulated fetcher panic"),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn targets(n: usize) -> Arc<[Target]> {
    (0..n).map(|i| Target::new(i as f64, 10.0)).collect()
}

fn token() -> ApiToken {
    ApiToken::parse("test_token").unwrap()
}

fn executor(fetcher: Arc<MockFetcher>, pool_size: usize) -> RoundExecutor {
    RoundExecutor::new(
        fetcher,
        pool_size,
        Duration::from_secs(10),
        FetchRateLimiter::unlimited(),
    )
}

// ============================================================================
// Outcome policy
// ============================================================================

#[tokio::test]
async fn test_all_targets_succeed() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Value(25.0)));
    let outcome = executor(Arc::clone(&fetcher), 8)
        .execute(RoundId(0), targets(2), token())
        .await;

    assert_eq!(outcome.state(), SamplingState::Done);
    assert_eq!(outcome.readings.len(), 2);
    assert!(outcome.readings.iter().all(|r| r.value == 25.0));
    assert!(outcome.readings.iter().all(|r| r.round == RoundId(0)));
    assert_eq!(outcome.stats.collected, 2);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_partial_success_is_done() {
    let fetcher = Arc::new(
        MockFetcher::new(Behavior::Value(30.0))
            .with_override(0.0, Behavior::Fail)
            .with_override(1.0, Behavior::Empty),
    );
    let outcome = executor(fetcher, 8)
        .execute(RoundId(3), targets(4), token())
        .await;

    assert_eq!(outcome.state(), SamplingState::Done);
    let mut lats: Vec<f64> = outcome.readings.iter().map(|r| r.target.latitude).collect();
    lats.sort_by(f64::total_cmp);
    assert_eq!(lats, vec![2.0, 3.0]);
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.stats.empty, 1);
    assert_eq!(outcome.stats.attempts(), 4);
}

#[tokio::test]
async fn test_all_targets_fail() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Fail));
    let outcome = executor(fetcher, 8)
        .execute(RoundId(0), targets(2), token())
        .await;

    assert_eq!(outcome.state(), SamplingState::Failed);
    assert!(outcome.readings.is_empty());
    assert_eq!(outcome.stats.failed, 2);
}

#[tokio::test]
async fn test_only_empty_values_fail_the_round() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Empty));
    let outcome = executor(fetcher, 8)
        .execute(RoundId(0), targets(3), token())
        .await;

    assert_eq!(outcome.state(), SamplingState::Failed);
    assert_eq!(outcome.stats.empty, 3);
}

#[tokio::test]
async fn test_non_finite_values_are_dropped() {
    let fetcher = Arc::new(
        MockFetcher::new(Behavior::Value(12.0)).with_override(0.0, Behavior::Value(f64::NAN)),
    );
    let outcome = executor(fetcher, 8)
        .execute(RoundId(0), targets(2), token())
        .await;

    assert_eq!(outcome.readings.len(), 1);
    assert_eq!(outcome.readings[0].value, 12.0);
    assert_eq!(outcome.stats.empty, 1);
}

#[tokio::test]
async fn test_no_targets_is_failed() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Value(1.0)));
    let outcome = executor(Arc::clone(&fetcher), 8)
        .execute(RoundId(0), targets(0), token())
        .await;

    assert_eq!(outcome.state(), SamplingState::Failed);
    assert_eq!(outcome.stats.attempts(), 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_target_times_out() {
    let fetcher = Arc::new(
        MockFetcher::new(Behavior::Value(40.0)).with_override(1.0, Behavior::Hang),
    );
    let executor = RoundExecutor::new(
        fetcher,
        4,
        Duration::from_secs(2),
        FetchRateLimiter::unlimited(),
    );

    let outcome = executor.execute(RoundId(0), targets(3), token()).await;

    assert_eq!(outcome.state(), SamplingState::Done);
    assert_eq!(outcome.readings.len(), 2);
    assert_eq!(outcome.stats.timed_out, 1);
}

#[tokio::test]
async fn test_panicking_fetch_only_loses_its_sample() {
    let fetcher = Arc::new(
        MockFetcher::new(Behavior::Value(5.0)).with_override(0.0, Behavior::Panic),
    );
    let outcome = executor(fetcher, 2)
        .execute(RoundId(0), targets(3), token())
        .await;

    assert_eq!(outcome.state(), SamplingState::Done);
    assert_eq!(outcome.readings.len(), 2);
    assert_eq!(outcome.stats.failed, 1);
}

// ============================================================================
// Pool bounds
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pool_bounds_concurrency() {
    let fetcher = Arc::new(
        MockFetcher::new(Behavior::Value(1.0)).with_delay(Duration::from_millis(100)),
    );
    let outcome = executor(Arc::clone(&fetcher), 3)
        .execute(RoundId(0), targets(10), token())
        .await;

    assert_eq!(outcome.readings.len(), 10);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pool_of_one_is_sequential() {
    let fetcher = Arc::new(
        MockFetcher::new(Behavior::Value(1.0)).with_delay(Duration::from_secs(1)),
    );
    let start = tokio::time::Instant::now();
    let outcome = executor(Arc::clone(&fetcher), 1)
        .execute(RoundId(0), targets(4), token())
        .await;

    assert_eq!(outcome.readings.len(), 4);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() >= Duration::from_secs(4));
}

// ============================================================================
// Rate limit (governor uses the wall clock, so these run in real time)
// ============================================================================

#[tokio::test]
async fn test_rate_limit_spaces_fetches() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Value(1.0)));
    let executor = RoundExecutor::new(
        Arc::clone(&fetcher) as Arc<dyn TargetFetcher>,
        8,
        Duration::from_secs(10),
        FetchRateLimiter::new(Some(10.0)),
    );

    let start = std::time::Instant::now();
    let outcome = executor.execute(RoundId(0), targets(3), token()).await;

    assert_eq!(outcome.readings.len(), 3);
    // First fetch is immediate, then one every 100ms
    assert!(start.elapsed() >= Duration::from_millis(190));
}

#[tokio::test]
async fn test_rate_limit_is_shared_across_rounds() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Value(1.0)));
    let executor = RoundExecutor::new(
        Arc::clone(&fetcher) as Arc<dyn TargetFetcher>,
        8,
        Duration::from_secs(10),
        FetchRateLimiter::new(Some(10.0)),
    );

    let start = std::time::Instant::now();
    let (first, second) = tokio::join!(
        executor.execute(RoundId(0), targets(2), token()),
        executor.execute(RoundId(1), targets(2), token()),
    );

    assert_eq!(first.readings.len() + second.readings.len(), 4);
    // Four fetches through one 10/s budget; separate budgets would take ~100ms
    assert!(start.elapsed() >= Duration::from_millis(290));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_zero_pool_is_clamped() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Empty));
    assert_eq!(executor(fetcher, 0).pool_size(), 1);
}

#[test]
fn test_executor_debug() {
    let fetcher = Arc::new(MockFetcher::new(Behavior::Empty));
    let debug = format!("{:?}", executor(fetcher, 4));
    assert!(debug.contains("mock"));
    assert!(debug.contains("pool_size: 4"));
}
