use std::time::Duration;

/// Bounded-attempt retry policy with capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Backoff delay before retrying after the given zero-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        delay_for_attempt(self.base_delay, self.max_delay, attempt)
    }
}

/// Pure backoff function: `min(base * 2^attempt, cap)`.
pub fn delay_for_attempt(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(cap, |d| d.min(cap))
}
