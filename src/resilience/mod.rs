//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream fetch:
//!     → timeouts.rs (overall deadline around every attempt)
//!     → On transport failure: retries.rs (retryable? attempts left?)
//!     → backoff.rs (linear delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Status responses are terminal; only the wire is retried
//! - Backoff is linear and jitter-free: one relay, one upstream

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{is_transport_error, RetryPolicy};
pub use timeouts::{with_deadline, DeadlineExceeded};
