//! Poll schedule for update calls waiting on certification.
//!
//! Delays start at the configured initial delay and grow geometrically up to
//! a per-poll cap. The schedule is anchored at submission: it ends at a fixed
//! deadline regardless of how long each status read took.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::PollConfig;

/// Stateful delay schedule for one poll loop.
#[derive(Debug, Clone)]
pub struct PollStrategy {
    next_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    started: Instant,
    deadline: Instant,
}

impl PollStrategy {
    /// Fresh schedule for a call submitted at `started`.
    pub fn new(config: &PollConfig, started: Instant) -> Self {
        let max_delay = Duration::from_millis(config.max_delay_ms);
        Self {
            next_delay: Duration::from_millis(config.initial_delay_ms).min(max_delay),
            multiplier: if config.multiplier >= 1.0 {
                config.multiplier
            } else {
                1.0
            },
            max_delay,
            started,
            deadline: started + Duration::from_millis(config.timeout_ms),
        }
    }

    /// Instant after which no further status read may run.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time from submission to `now`.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Delay before the next poll, or `None` once `now` is at the deadline.
    ///
    /// A delay never runs past the deadline.
    pub fn next_delay(&mut self, now: Instant) -> Option<Duration> {
        let remaining = self.deadline.checked_duration_since(now)?;
        if remaining.is_zero() {
            return None;
        }
        let delay = self.next_delay.min(remaining);
        let grown = (self.next_delay.as_millis() as f64 * self.multiplier).round() as u64;
        self.next_delay = Duration::from_millis(grown).min(self.max_delay);
        Some(delay)
    }
}
