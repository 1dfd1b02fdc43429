use std::time::Duration;

/// Exponential backoff between attempts of one request.
///
/// The wait after failed attempt `n` (zero based) is `base * 2^n`, so with the
/// default one second base a request waits 1s, 2s, 4s before its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    retries: u32,
}

impl RetryPolicy {
    /// Policy allowing `retries` retries after the first attempt.
    pub fn new(base: Duration, retries: u32) -> Self {
        Self { base, retries }
    }

    /// Total number of attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Returns the wait before retrying after failed attempt `attempt`,
    /// or `None` if the budget is spent.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.retries {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor))
    }
}
