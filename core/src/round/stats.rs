//! Per-round fetch statistics

use std::time::{Duration, Instant};

/// Outcome counts of the fetches made by one round
#[derive(Debug, Default, Clone)]
pub struct RoundStats {
    /// Fetches that produced a reading
    pub collected: usize,

    /// Fetches that answered without a value
    pub empty: usize,

    /// Fetches that returned an error (or whose task died)
    pub failed: usize,

    /// Fetches cut off by the fetch timeout
    pub timed_out: usize,

    /// Round start time
    pub started_at: Option<Instant>,

    /// Round end time
    pub ended_at: Option<Instant>,
}

impl RoundStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start time
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Record the end time
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Record a fetch that produced a reading
    pub fn record_reading(&mut self) {
        self.collected += 1;
    }

    /// Record a fetch that answered without a value
    pub fn record_empty(&mut self) {
        self.empty += 1;
    }

    /// Record a failed fetch
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Record a fetch that hit the timeout
    pub fn record_timeout(&mut self) {
        self.timed_out += 1;
    }

    /// Total fetch attempts
    pub fn attempts(&self) -> usize {
        self.collected + self.empty + self.failed + self.timed_out
    }

    /// Fetches that did not produce a reading
    pub fn dropped(&self) -> usize {
        self.attempts() - self.collected
    }

    /// Fraction of attempts that produced a reading (0.0 - 1.0)
    pub fn yield_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            n => self.collected as f64 / n as f64,
        }
    }

    /// Time spent in the round so far, or in total once stopped
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }
}
