//! Capped exponential backoff with jitter

use rand::Rng;
use std::time::Duration;

/// Jitter added to or subtracted from each delay
const JITTER: Duration = Duration::from_millis(250);

/// Reconnect and retry delay generator
///
/// Delays double from `base` up to `max`; each delay gets up to ±250ms of
/// jitter and never drops below zero.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
    jitter: bool,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
            jitter: true,
        }
    }

    /// Disable jitter, for deterministic schedules
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Number of delays handed out since the last reset
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Delay for the given attempt without jitter
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Next delay, advancing the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if !self.jitter {
            return delay;
        }

        let jitter_ms = rand::thread_rng().gen_range(0..=JITTER.as_millis() as u64 * 2);
        let jittered = (delay + Duration::from_millis(jitter_ms)).saturating_sub(JITTER);
        jittered.min(self.max)
    }

    /// Start over after a success
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
