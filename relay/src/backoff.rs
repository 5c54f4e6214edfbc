//! Exponential backoff with jitter for the startup connection loop.

use std::time::Duration;

use rand::Rng;

/// Doubling delay with a ceiling and ±`jitter` randomization.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    jitter: f64,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            current: initial,
            max,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Delay to wait before the next attempt. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = self.current.checked_mul(2).unwrap_or(self.max).min(self.max);

        if self.jitter == 0.0 {
            return base;
        }

        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        base.mul_f64(factor)
    }
}

impl Default for Backoff {
    /// 1s, 2s, 4s ... capped at 30s, ±20%.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 0.2)
    }
}
