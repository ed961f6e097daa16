//! Exponential backoff for the downstream forwarder.
//!
//! Adapted from the sync client's `RetryStrategy`, but without jitter:
//! spec §4.4 step 4 mandates `min(base_delay*2^(attempt-1), max_delay)`
//! with no jitter term.

use std::time::Duration;

/// Retry/backoff configuration for a downstream call.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay_ms, max_delay_ms }
    }

    /// Delay to sleep before retrying, given a 1-indexed attempt number
    /// that just failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(32));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }

    /// Whether another attempt remains after `attempt` has failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, 100, 1500)
    }
}
