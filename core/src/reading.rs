//! Collected readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::RoundId;
use crate::target::Target;

/// One successful sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Round that collected the sample
    pub round: RoundId,

    /// Target the sample came from
    pub target: Target,

    /// Sampled value
    pub value: f64,

    /// When the fetch returned
    pub recorded_at: DateTime<Utc>,
}

impl Reading {
    /// Create a reading stamped with the current time
    pub fn new(round: RoundId, target: Target, value: f64) -> Self {
        Self {
            round,
            target,
            value,
            recorded_at: Utc::now(),
        }
    }
}

/// Arithmetic mean, `None` for an empty set
pub fn mean<'a, I>(readings: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let (sum, count) = readings
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), r| (sum + r.value, count + 1));

    (count > 0).then(|| sum / count as f64)
}
