//! Relay failure taxonomy.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Why the upstream image could not be obtained.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The static upstream configuration is unusable. Never retried.
    #[error("invalid upstream configuration: {0}")]
    InvalidConfig(String),

    /// Every attempt failed on the wire.
    #[error("upstream unreachable after {attempts} attempt(s): {source}")]
    UpstreamUnreachable {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with something other than 200. Never retried.
    #[error("upstream returned status {0}")]
    UpstreamStatus(StatusCode),

    /// The overall fetch budget elapsed.
    #[error("upstream fetch exceeded its {0:?} budget")]
    DeadlineExceeded(Duration),

    /// The client rejected the request before sending it.
    #[error("failed to issue upstream request: {0}")]
    Request(#[source] reqwest::Error),
}

impl RelayError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::InvalidConfig(_) => "invalid_config",
            RelayError::UpstreamUnreachable { .. } => "unreachable",
            RelayError::UpstreamStatus(_) => "status",
            RelayError::DeadlineExceeded(_) => "deadline",
            RelayError::Request(_) => "request",
        }
    }
}
