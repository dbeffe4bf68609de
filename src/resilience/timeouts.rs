//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a whole operation by a deadline
//! - Report the elapsed budget in the error so callers can log it
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the wrapped future is dropped on expiry,
//!   which aborts any in-flight I/O it owns

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The operation did not finish within its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` to completion or fail once `budget` elapses.
pub async fn with_deadline<F, T>(budget: Duration, fut: F) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| DeadlineExceeded(budget))
}
