//! Bounded retry with linear, jittered backoff.

use rand::Rng;
use std::time::Duration;

/// Retry policy for a single remote call.
///
/// `max_attempts` counts total invocations, so a policy of 10 makes at most
/// ten calls. The delay before attempt `t + 1` is `t * U(0,1) * interval`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` of 0 is treated as one attempt.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total invocations allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff interval scale.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether another call may follow failed attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.interval.mul_f64(attempt as f64 * jitter)
    }
}
