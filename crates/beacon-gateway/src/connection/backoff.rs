//! Reconnect backoff

use rand::Rng;
use std::time::Duration;

/// Growth factor between attempts
const FACTOR: f64 = 2.0;

/// Jittered exponential backoff between reconnect attempts
///
/// Each delay is drawn from `[d/2, d]` where `d` doubles per attempt up to
/// `max`. A successful READY or RESUMED resets it.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
    max_attempts: Option<u32>,
}

impl ReconnectBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            attempts: 0,
            max_attempts,
        }
    }

    /// Delay before the next attempt, or `None` once the attempt budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.attempts >= max) {
            return None;
        }
        self.attempts += 1;

        let ceiling = self.current;
        let next = (self.current.as_secs_f64() * FACTOR).min(self.max.as_secs_f64());
        self.current = Duration::from_secs_f64(next);

        Some(ceiling.mul_f64(rand::thread_rng().gen_range(0.5..=1.0)))
    }

    /// Forget previous failures
    pub fn reset(&mut self) {
        self.current = self.base;
        self.attempts = 0;
    }

    /// Attempts since the last reset
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
