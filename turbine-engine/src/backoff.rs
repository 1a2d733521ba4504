//! Backoff delay calculation for the retry controller

use rand::Rng;
use std::time::Duration;

/// Exponential backoff calculator with uniform jitter
pub(crate) struct Backoff {
    base: Duration,
    max: Duration,
    factor: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, factor: f64) -> Self {
        Self { base, max, factor }
    }

    /// Raw delay for a zero-indexed attempt: `min(base · factor^attempt, max)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.powi(attempt as i32);
        let nanos = (self.base.as_nanos() as f64 * multiplier).min(self.max.as_nanos() as f64);
        Duration::from_nanos(nanos as u64).min(self.max)
    }

    /// Delay with ±25 % uniform jitter, rounded to whole milliseconds
    ///
    /// Jitter spreads synchronized retry storms apart.
    pub fn jittered(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let unit: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
        let ms = delay.as_millis() as f64;
        Duration::from_millis((ms + ms * 0.25 * unit).round().max(0.0) as u64)
    }
}
