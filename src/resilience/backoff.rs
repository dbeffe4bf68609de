//! Linear backoff between upstream attempts.

use std::time::Duration;

/// Delay before the attempt that follows failed attempt `attempt` (1-based).
///
/// Attempt `n` waits `n * step`. Attempt 0 never waits.
pub fn linear_backoff(attempt: u32, step: Duration) -> Duration {
    step.saturating_mul(attempt)
}
