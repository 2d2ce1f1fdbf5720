//! Round and session states, and the rule folding one into the other

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state shared by rounds and sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingState {
    /// Nothing running: not started, or between rounds
    #[default]
    Idle,
    /// At least one round is fetching
    Running,
    /// Completed with readings
    Done,
    /// Completed without readings, or could not start
    Failed,
    /// Concluded by `stop()`
    Stopped,
}

impl SamplingState {
    /// Whether a round in this state will never change again on its own
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Stopped)
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SamplingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequence number of a round within one run
///
/// Assigned in trigger order and used as an index into the round table, so it
/// stays unique even when two rounds share an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoundId(pub usize);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round-{}", self.0)
    }
}

/// Fold round states into a session state
///
/// Evaluated in priority order:
///
/// 1. any round `Running` -> `Running`
/// 2. all rounds `Done` -> `Done`
/// 3. all rounds `Failed` -> `Failed`
/// 4. every round terminal and at least one `Stopped` -> `Stopped`
/// 5. otherwise -> `Idle`
///
/// An empty table is `Idle`. Rule 4 closes the case where a partial stop left
/// `Done` and `Stopped` rounds behind, which would otherwise read as `Idle`.
/// A terminal mix of only `Done` and `Failed` rounds stays `Idle`; use
/// [`is_settled`] to detect that the run is over.
pub fn derive_session_state<I>(rounds: I) -> SamplingState
where
    I: IntoIterator<Item = SamplingState>,
{
    let mut total = 0usize;
    let mut done = 0usize;
    let mut failed = 0usize;
    let mut stopped = 0usize;

    for state in rounds {
        total += 1;
        match state {
            SamplingState::Running => return SamplingState::Running,
            SamplingState::Done => done += 1,
            SamplingState::Failed => failed += 1,
            SamplingState::Stopped => stopped += 1,
            SamplingState::Idle => {}
        }
    }

    if total == 0 {
        SamplingState::Idle
    } else if done == total {
        SamplingState::Done
    } else if failed == total {
        SamplingState::Failed
    } else if stopped > 0 && done + failed + stopped == total {
        SamplingState::Stopped
    } else {
        SamplingState::Idle
    }
}

/// Whether no round can change state any more
pub fn is_settled<I>(rounds: I) -> bool
where
    I: IntoIterator<Item = SamplingState>,
{
    rounds.into_iter().all(SamplingState::is_terminal)
}
