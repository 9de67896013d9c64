//! Exponential backoff with jitter for work-queue retries.
//!
//! Reconcile bodies never retry internally; a failed name is re-enqueued by
//! the control loop after a delay computed here. Jitter avoids thundering
//! herd when many names fail at once (e.g., an API server outage).

use std::time::Duration;

use rand::Rng;

/// Delay schedule for re-enqueueing failed reconciles.
#[derive(Clone, Debug)]
pub struct Backoff {
    /// Delay before the first retry
    pub initial: Duration,
    /// Ceiling for the computed delay
    pub max: Duration,
    /// Multiplier applied per attempt
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Compute the jittered delay for the given attempt (1-based).
    ///
    /// The base delay grows exponentially up to `max`; the returned value is
    /// drawn uniformly from the upper half of the base interval.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let base = self.initial.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = base.min(self.max.as_secs_f64());
        let jittered = capped * rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(jittered)
    }
}
