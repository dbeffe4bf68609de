//! Client-facing error responses.
//!
//! Upstream and database detail stays in the logs; clients get a generic
//! plain-text message and a 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::relay::RelayError;
use crate::streaming::StreamError;

pub const INTERNAL_ERROR: &str = "Internal Server Error";
pub const FETCH_FAILED: &str = "Failed to fetch image";

/// Response for a failed fetch phase.
pub fn relay_error_response(err: &RelayError) -> Response {
    let message = match err {
        RelayError::InvalidConfig(_) | RelayError::Request(_) => INTERNAL_ERROR,
        RelayError::UpstreamUnreachable { .. }
        | RelayError::UpstreamStatus(_)
        | RelayError::DeadlineExceeded(_) => FETCH_FAILED,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

/// Response when the transfer cannot start. Only reachable before any
/// byte was committed to the client.
pub fn stream_error_response(_err: &StreamError) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
}
