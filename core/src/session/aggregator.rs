//! Round table and reading store behind a single lock

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::reading::{self, Reading};
use crate::round::RoundOutcome;
use crate::state::{derive_session_state, is_settled, RoundId, SamplingState};

/// One registered round
struct RoundSlot {
    offset: Duration,
    state: SamplingState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Everything guarded by the aggregator lock
#[derive(Default)]
struct Ledger {
    /// Indexed by `RoundId`
    rounds: Vec<RoundSlot>,
    readings: Vec<Reading>,
    /// Set by stop, validation and discovery outcomes; wins over derivation
    forced: Option<SamplingState>,
}

impl Ledger {
    fn session_state(&self) -> SamplingState {
        self.forced
            .unwrap_or_else(|| derive_session_state(self.rounds.iter().map(|r| r.state)))
    }

    fn is_settled(&self) -> bool {
        is_settled(self.rounds.iter().map(|r| r.state))
    }

    fn average(&self) -> Option<f64> {
        match self.session_state() {
            SamplingState::Done => reading::mean(&self.readings),
            _ => None,
        }
    }
}

/// What `stop` has to wait for after cancelling pending rounds
pub(crate) struct Drain {
    /// Every round task still joinable
    pub handles: Vec<(RoundId, JoinHandle<()>)>,
    /// Rounds that were `Running` when the drain began
    pub running: Vec<RoundId>,
    /// Rounds moved from `Idle` to `Stopped`
    pub cancelled: usize,
}

/// State of one round in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSnapshot {
    /// Round id
    pub id: RoundId,
    /// Trigger offset from session start
    #[serde(with = "humantime_serde")]
    pub offset: Duration,
    /// Current state
    pub state: SamplingState,
}

/// Consistent view of a session, taken under one lock acquisition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Session state
    pub state: SamplingState,
    /// No round can change state any more
    pub settled: bool,
    /// Per-round states, in trigger order
    pub rounds: Vec<RoundSnapshot>,
    /// Cached target count
    pub targets: usize,
    /// Readings collected so far
    pub readings: usize,
    /// Mean reading, only once the session is `Done`
    pub average: Option<f64>,
}

/// Mutex-guarded round table and reading store
///
/// All methods take the lock for the duration of one transition and never
/// across an await. Waiters for round completion use [`Notify`], which every
/// mutation that can settle the table signals.
pub struct StateAggregator {
    ledger: Mutex<Ledger>,
    changed: Notify,
}

impl StateAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // Ledger updates are single assignments/pushes; a panic elsewhere
        // while holding the lock cannot leave it half-written.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new `Idle` round
    pub(crate) fn register(&self, offset: Duration, cancel: CancellationToken) -> RoundId {
        let mut ledger = self.lock();
        let id = RoundId(ledger.rounds.len());
        ledger.rounds.push(RoundSlot {
            offset,
            state: SamplingState::Idle,
            cancel,
            handle: None,
        });
        id
    }

    /// Attach the task handle of a registered round
    pub(crate) fn attach(&self, id: RoundId, handle: JoinHandle<()>) {
        if let Some(slot) = self.lock().rounds.get_mut(id.0) {
            slot.handle = Some(handle);
        }
    }

    /// Set a round's state; returns `false` if the round is unknown
    pub fn set_round_state(&self, id: RoundId, state: SamplingState) -> bool {
        let updated = match self.lock().rounds.get_mut(id.0) {
            Some(slot) => {
                slot.state = state;
                true
            }
            None => false,
        };
        if updated && state.is_terminal() {
            self.changed.notify_waiters();
        }
        updated
    }

    /// Move a round from `Idle` to `Running`
    ///
    /// Returns `false` if the round was cancelled (or cleared) first, in which
    /// case it must not run.
    pub(crate) fn begin_round(&self, id: RoundId) -> bool {
        let mut ledger = self.lock();
        match ledger.rounds.get_mut(id.0) {
            Some(slot) if slot.state == SamplingState::Idle => {
                slot.state = SamplingState::Running;
                true
            }
            _ => false,
        }
    }

    /// Record a finished round: append its readings and set its state
    /// in one step
    pub(crate) fn complete_round(&self, outcome: RoundOutcome) -> SamplingState {
        let state = outcome.state();
        {
            let mut ledger = self.lock();
            let Some(slot) = ledger.rounds.get_mut(outcome.round.0) else {
                return state;
            };
            slot.state = state;
            ledger.readings.extend(outcome.readings);
        }
        self.changed.notify_waiters();
        state
    }

    /// Session state: forced value if any, otherwise derived from the rounds
    pub fn session_state(&self) -> SamplingState {
        self.lock().session_state()
    }

    /// Override the derived session state
    pub(crate) fn force_state(&self, state: SamplingState) {
        self.lock().forced = Some(state);
        self.changed.notify_waiters();
    }

    /// Drop any override so the state is derived again
    pub(crate) fn clear_forced(&self) {
        self.lock().forced = None;
    }

    /// Whether every registered round is terminal
    pub fn is_settled(&self) -> bool {
        self.lock().is_settled()
    }

    /// Number of registered rounds
    pub fn round_count(&self) -> usize {
        self.lock().rounds.len()
    }

    /// State of one round
    pub fn round_state(&self, id: RoundId) -> Option<SamplingState> {
        self.lock().rounds.get(id.0).map(|slot| slot.state)
    }

    /// Copy of the collected readings
    pub fn readings(&self) -> Vec<Reading> {
        self.lock().readings.clone()
    }

    /// Mean of the readings if the session is `Done` and any were collected
    pub fn average_reading(&self) -> Option<f64> {
        self.lock().average()
    }

    /// Snapshot of the whole ledger
    pub fn snapshot(&self, targets: usize) -> SessionSnapshot {
        let ledger = self.lock();
        SessionSnapshot {
            state: ledger.session_state(),
            settled: ledger.is_settled(),
            rounds: ledger
                .rounds
                .iter()
                .enumerate()
                .map(|(i, slot)| RoundSnapshot {
                    id: RoundId(i),
                    offset: slot.offset,
                    state: slot.state,
                })
                .collect(),
            targets,
            readings: ledger.readings.len(),
            average: ledger.average(),
        }
    }

    /// Wait until every registered round is terminal
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before checking so a change between the check and the
            // await is not missed.
            notified.as_mut().enable();

            if self.is_settled() {
                return;
            }
            notified.await;
        }
    }

    /// Cancel every round that has not fired yet and hand out all task handles
    pub(crate) fn drain(&self) -> Drain {
        let drain = {
            let mut ledger = self.lock();
            let mut drain = Drain {
                handles: Vec::new(),
                running: Vec::new(),
                cancelled: 0,
            };

            for (i, slot) in ledger.rounds.iter_mut().enumerate() {
                let id = RoundId(i);
                match slot.state {
                    SamplingState::Idle => {
                        slot.cancel.cancel();
                        slot.state = SamplingState::Stopped;
                        drain.cancelled += 1;
                    }
                    SamplingState::Running => drain.running.push(id),
                    _ => {}
                }
                if let Some(handle) = slot.handle.take() {
                    drain.handles.push((id, handle));
                }
            }
            drain
        };
        self.changed.notify_waiters();
        drain
    }

    /// Cancel pending rounds without waiting for anything
    pub(crate) fn cancel_pending(&self) {
        for slot in self.lock().rounds.iter() {
            if slot.state == SamplingState::Idle {
                slot.cancel.cancel();
            }
        }
    }

    /// Clear rounds and readings, then set (or clear) the forced state
    pub(crate) fn conclude(&self, forced: Option<SamplingState>) {
        {
            let mut ledger = self.lock();
            ledger.rounds.clear();
            ledger.readings.clear();
            ledger.forced = forced;
        }
        self.changed.notify_waiters();
    }
}

impl Default for StateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.lock();
        f.debug_struct("StateAggregator")
            .field("rounds", &ledger.rounds.len())
            .field("readings", &ledger.readings.len())
            .field("state", &ledger.session_state())
            .finish()
    }
}
