//! Upstream response handed from the fetcher to the streaming responder.

use std::fmt;
use std::pin::Pin;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use futures_util::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Readable upstream body. Dropping it closes the upstream connection.
pub type UpstreamBody = Pin<Box<dyn AsyncRead + Send>>;

/// Status, the mirrored headers, and the still-open body of an upstream reply.
///
/// The body is owned here until [`UpstreamResponse::into_parts`] moves it
/// into the responder, so it is closed exactly once whichever path drops it.
pub struct UpstreamResponse {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    content_length: Option<HeaderValue>,
    body: UpstreamBody,
}

impl UpstreamResponse {
    pub fn new<R>(status: StatusCode, headers: &HeaderMap, body: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            status,
            content_type: headers.get(header::CONTENT_TYPE).cloned(),
            content_length: headers.get(header::CONTENT_LENGTH).cloned(),
            body: Box::pin(body),
        }
    }

    pub(crate) fn from_reqwest(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let stream = response
            .bytes_stream()
            .map_err(std::io::Error::other);
        Self::new(status, &headers, StreamReader::new(stream))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    pub fn content_length(&self) -> Option<&HeaderValue> {
        self.content_length.as_ref()
    }

    /// Advertised body size, when upstream sent a parseable `Content-Length`.
    pub fn advertised_len(&self) -> Option<u64> {
        self.content_length
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Headers to mirror onto the client response, verbatim.
    pub fn mirrored_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = &self.content_type {
            headers.insert(header::CONTENT_TYPE, value.clone());
        }
        if let Some(value) = &self.content_length {
            headers.insert(header::CONTENT_LENGTH, value.clone());
        }
        headers
    }

    pub fn into_parts(self) -> (HeaderMap, UpstreamBody) {
        let headers = self.mirrored_headers();
        (headers, self.body)
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
