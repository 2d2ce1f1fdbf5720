//! Session lifecycle: start, stop and the query surface

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{ApiToken, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::reading::Reading;
use crate::round::RoundExecutor;
use crate::schedule::{self, Schedule};
use crate::state::{RoundId, SamplingState};
use crate::target::Target;
use crate::traits::{DiscoveryError, TargetDiscovery};

use super::aggregator::{SessionSnapshot, StateAggregator};

/// A sampling campaign over one bounding box
///
/// Owns the round table, the reading store and the target cache. Every
/// failure of a remote service ends up in [`status`](Self::status); only API
/// misuse is reported as an error.
pub struct SamplingSession {
    /// Session configuration
    pub(crate) config: SessionConfig,

    /// Round offsets
    pub(crate) schedule: Schedule,

    /// Target discovery (shared)
    pub(crate) discovery: Arc<dyn TargetDiscovery>,

    /// Round executor (shared by all round tasks)
    pub(crate) executor: Arc<RoundExecutor>,

    /// Round table and readings (shared by all round tasks)
    pub(crate) aggregator: Arc<StateAggregator>,

    /// Credential, if one has been accepted
    pub(crate) token: Mutex<Option<ApiToken>>,

    /// Discovered targets; empty until discovery succeeds with results
    pub(crate) targets: Mutex<Option<Arc<[Target]>>>,

    /// Serializes start and stop against each other
    pub(crate) lifecycle: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SamplingSession {
    /// Create a new session
    ///
    /// Use `SessionBuilder` for validated construction.
    pub(crate) fn new(
        config: SessionConfig,
        schedule: Schedule,
        discovery: Arc<dyn TargetDiscovery>,
        executor: RoundExecutor,
        token: Option<ApiToken>,
    ) -> Self {
        Self {
            config,
            schedule,
            discovery,
            executor: Arc::new(executor),
            aggregator: Arc::new(StateAggregator::new()),
            token: Mutex::new(token),
            targets: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Round schedule
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Set the API token
    ///
    /// A malformed token is rejected and the session state becomes `Failed`
    /// until the next start.
    pub fn set_token(&self, raw: impl Into<String>) -> SessionResult<()> {
        match ApiToken::parse(raw) {
            Ok(token) => {
                *lock(&self.token) = Some(token);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected API token");
                *lock(&self.token) = None;
                self.aggregator.force_state(SamplingState::Failed);
                Err(e.into())
            }
        }
    }

    /// Start sampling in the background
    ///
    /// Returns once every round is armed. Rounds whose offset is zero may
    /// already be running when this returns.
    ///
    /// # Errors
    ///
    /// `SessionError::AlreadyStarted` if rounds from an earlier start are
    /// still registered. Call [`stop`](Self::stop) or [`reset`](Self::reset)
    /// before starting again. Remote failures are not errors; they are
    /// reported through the returned state.
    pub async fn start(&self) -> SessionResult<SamplingState> {
        self.arm_rounds().await
    }

    /// Start sampling and wait for every round to settle
    ///
    /// Waits at most `period + completion_grace`; on timeout the rounds keep
    /// running in the background and the current state is returned.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn start_blocking(&self) -> SessionResult<SamplingState> {
        self.arm_rounds().await?;

        let timeout = self.config.blocking_timeout();
        if tokio::time::timeout(timeout, self.aggregator.wait_settled())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                state = %self.status(),
                "Rounds did not settle before the timeout"
            );
        }

        Ok(self.status())
    }

    async fn arm_rounds(&self) -> SessionResult<SamplingState> {
        let _lifecycle = self.lifecycle.lock().await;

        let registered = self.aggregator.round_count();
        if registered > 0 {
            return Err(SessionError::AlreadyStarted { rounds: registered });
        }
        self.aggregator.clear_forced();

        let token = lock(&self.token).clone();
        let Some(token) = token else {
            tracing::warn!("No API token set; session failed");
            self.aggregator.force_state(SamplingState::Failed);
            return Ok(SamplingState::Failed);
        };

        let targets = match self.ensure_targets(&token).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!(
                    discovery = self.discovery.name(),
                    error = %e,
                    "Target discovery failed"
                );
                self.aggregator.force_state(SamplingState::Failed);
                return Ok(SamplingState::Failed);
            }
        };

        if targets.is_empty() {
            tracing::info!(bounds = %self.config.bounds, "No targets inside bounds; nothing to sample");
            self.aggregator.force_state(SamplingState::Done);
            return Ok(SamplingState::Done);
        }

        tracing::info!(
            targets = targets.len(),
            rounds = self.schedule.round_count(),
            interval_secs = self.schedule.interval().as_secs(),
            pool_size = self.executor.pool_size(),
            "Starting sampling session"
        );

        let origin = Instant::now();
        for offset in self.schedule.offsets() {
            let cancel = CancellationToken::new();
            let id = self.aggregator.register(offset, cancel.clone());
            let round = self.round_task(id, Arc::clone(&targets), token.clone());
            let handle = schedule::arm(origin, offset, cancel, move || round);
            self.aggregator.attach(id, handle);
        }

        Ok(self.status())
    }

    /// Body of one deferred round
    fn round_task(
        &self,
        id: RoundId,
        targets: Arc<[Target]>,
        token: ApiToken,
    ) -> impl Future<Output = ()> + Send + 'static {
        let aggregator = Arc::clone(&self.aggregator);
        let executor = Arc::clone(&self.executor);

        async move {
            if !aggregator.begin_round(id) {
                tracing::debug!(round = %id, "Round cancelled before it could start");
                return;
            }

            let outcome = executor.execute(id, targets, token).await;
            let state = aggregator.complete_round(outcome);
            tracing::debug!(round = %id, state = %state, session = %aggregator.session_state(), "Round recorded");
        }
    }

    /// Cached targets, discovering them first if the cache is empty
    async fn ensure_targets(&self, token: &ApiToken) -> Result<Arc<[Target]>, DiscoveryError> {
        if let Some(targets) = lock(&self.targets).clone() {
            return Ok(targets);
        }

        let discovered: Arc<[Target]> = self
            .discovery
            .discover(&self.config.bounds, token)
            .await?
            .into();

        tracing::debug!(
            discovery = self.discovery.name(),
            targets = discovered.len(),
            "Targets discovered"
        );

        if !discovered.is_empty() {
            *lock(&self.targets) = Some(Arc::clone(&discovered));
        }
        Ok(discovered)
    }

    /// Stop the session
    ///
    /// Rounds that have not fired are cancelled; rounds already running are
    /// waited for, never interrupted. The session then ends `Stopped` with
    /// its rounds and readings cleared. Safe to call at any time, any number
    /// of times.
    pub async fn stop(&self) -> SamplingState {
        self.drain_rounds().await;
        self.aggregator.conclude(Some(SamplingState::Stopped));
        tracing::info!("Sampling session stopped");
        SamplingState::Stopped
    }

    /// Stop any rounds like [`stop`](Self::stop), then return to `Idle`
    ///
    /// The target cache and token are kept.
    pub async fn reset(&self) {
        self.drain_rounds().await;
        self.aggregator.conclude(None);
        tracing::debug!("Sampling session reset");
    }

    async fn drain_rounds(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let drain = self.aggregator.drain();

        if !drain.handles.is_empty() {
            tracing::debug!(
                cancelled = drain.cancelled,
                in_flight = drain.running.len(),
                "Draining rounds"
            );
        }

        // No lock is held here: running rounds need the aggregator to finish.
        let (ids, handles): (Vec<_>, Vec<_>) = drain.handles.into_iter().unzip();
        for (id, joined) in ids.into_iter().zip(futures::future::join_all(handles).await) {
            if let Err(e) = joined {
                tracing::warn!(round = %id, error = %e, "Round task did not finish cleanly");
            }
        }

        for id in drain.running {
            self.aggregator.set_round_state(id, SamplingState::Stopped);
        }
    }

    /// Current session state
    pub fn status(&self) -> SamplingState {
        self.aggregator.session_state()
    }

    /// Mean of the collected readings
    ///
    /// `None` unless the session is `Done` and at least one reading was
    /// collected.
    pub fn average_reading(&self) -> Option<f64> {
        self.aggregator.average_reading()
    }

    /// Whether no round is pending or running
    pub fn is_settled(&self) -> bool {
        self.aggregator.is_settled()
    }

    /// Collected readings
    pub fn readings(&self) -> Vec<Reading> {
        self.aggregator.readings()
    }

    /// Cached targets
    pub fn targets(&self) -> Vec<Target> {
        lock(&self.targets)
            .as_deref()
            .map(<[Target]>::to_vec)
            .unwrap_or_default()
    }

    /// Forget the cached targets so the next start discovers again
    pub fn clear_targets(&self) {
        *lock(&self.targets) = None;
    }

    /// State of one round of the current run
    pub fn round_state(&self, id: RoundId) -> Option<SamplingState> {
        self.aggregator.round_state(id)
    }

    /// Consistent snapshot of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        let targets = lock(&self.targets).as_ref().map_or(0, |t| t.len());
        self.aggregator.snapshot(targets)
    }
}

impl Drop for SamplingSession {
    fn drop(&mut self) {
        // Running rounds finish on their own; pending ones would only sample
        // into a session nobody can read any more.
        self.aggregator.cancel_pending();
    }
}

impl std::fmt::Debug for SamplingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingSession")
            .field("config", &self.config)
            .field("schedule", &self.schedule)
            .field("discovery", &self.discovery.name())
            .field("executor", &self.executor)
            .field("aggregator", &self.aggregator)
            .finish()
    }
}
