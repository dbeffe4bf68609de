//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether an upstream failure is retryable
//! - Hold the attempt limit and the backoff step
//!
//! # Design Decisions
//! - Only transport-level failures are retried (connect, TLS, timeout, reset)
//! - An HTTP status from upstream is an answer, never retried
//! - Request construction errors are configuration problems, never retried

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::linear_backoff;

/// Bounded retry policy with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Backoff step; failed attempt `n` waits `n * step`.
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// Delay to wait after failed attempt `attempt`, or `None` when no
    /// attempt follows.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(linear_backoff(attempt, self.backoff_step))
        }
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| linear_backoff(attempt, self.backoff_step))
            .sum()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_step_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Whether a client error happened on the wire rather than in our own
/// request construction or response handling.
pub fn is_transport_error(err: &reqwest::Error) -> bool {
    !(err.is_builder() || err.is_redirect() || err.is_status() || err.is_decode())
}
