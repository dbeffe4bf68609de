//! Relay fetcher: one upstream GET with bounded retries under a deadline.

use std::time::{Duration, Instant};

use axum::http::StatusCode;

use crate::config::{RelayConfig, TimeoutConfig, UpstreamConfig};
use crate::observability::metrics;
use crate::relay::error::RelayError;
use crate::relay::request::OutboundRequest;
use crate::relay::response::UpstreamResponse;
use crate::resilience::{is_transport_error, with_deadline, RetryPolicy};

/// Fetches the upstream image.
///
/// Holds no per-request state; the injected client is shared for the
/// process lifetime and owns connection pooling, TLS and timeouts.
#[derive(Debug, Clone)]
pub struct RelayFetcher {
    client: reqwest::Client,
    upstream: UpstreamConfig,
    policy: RetryPolicy,
    deadline: Duration,
}

impl RelayFetcher {
    pub fn new(
        client: reqwest::Client,
        upstream: UpstreamConfig,
        policy: RetryPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            client,
            upstream,
            policy,
            deadline,
        }
    }

    /// Build the fetcher and its HTTP client from configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = build_client(&config.upstream, &config.timeouts)?;
        Ok(Self::new(
            client,
            config.upstream.clone(),
            RetryPolicy::from(&config.retries),
            Duration::from_secs(config.timeouts.request_secs),
        ))
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Obtain an open 200 response from upstream.
    ///
    /// Dropping the returned future aborts any in-flight attempt.
    pub async fn fetch(&self, request_id: &str) -> Result<UpstreamResponse, RelayError> {
        let request = OutboundRequest::from_config(&self.upstream);
        let url = request.to_url()?;

        tracing::debug!(
            request_id = %request_id,
            url = %request.redacted_url(),
            "Fetching upstream image"
        );

        with_deadline(self.deadline, self.fetch_with_retries(url, request_id))
            .await
            .map_err(|e| RelayError::DeadlineExceeded(e.0))?
    }

    async fn fetch_with_retries(
        &self,
        url: url::Url,
        request_id: &str,
    ) -> Result<UpstreamResponse, RelayError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();

            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::OK {
                        metrics::record_upstream_attempt("status");
                        tracing::warn!(
                            request_id = %request_id,
                            attempt,
                            status = %status,
                            "Upstream returned non-200 status"
                        );
                        return Err(RelayError::UpstreamStatus(status));
                    }

                    metrics::record_upstream_attempt("ok");
                    tracing::debug!(
                        request_id = %request_id,
                        attempt,
                        elapsed = ?started.elapsed(),
                        "Upstream responded"
                    );
                    return Ok(UpstreamResponse::from_reqwest(response));
                }
                Err(e) if is_transport_error(&e) => {
                    metrics::record_upstream_attempt("transport_error");
                    tracing::warn!(
                        request_id = %request_id,
                        attempt,
                        error = %e,
                        "Upstream attempt failed"
                    );

                    match self.policy.delay_after(attempt) {
                        Some(delay) => {
                            tracing::info!(
                                request_id = %request_id,
                                attempt,
                                delay = ?delay,
                                "Retrying after network error"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(RelayError::UpstreamUnreachable {
                                attempts: attempt,
                                source: e,
                            });
                        }
                    }
                }
                Err(e) => return Err(RelayError::Request(e)),
            }
        }
    }
}

/// Construct the shared upstream client.
pub fn build_client(
    upstream: &UpstreamConfig,
    timeouts: &TimeoutConfig,
) -> Result<reqwest::Client, RelayError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_millis(timeouts.attempt_ms))
        .tcp_keepalive(Duration::from_secs(timeouts.keepalive_secs))
        .user_agent(concat!("image-relay/", env!("CARGO_PKG_VERSION")));

    builder = match &upstream.proxy {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| RelayError::InvalidConfig(format!("proxy {}: {}", proxy, e)))?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| RelayError::InvalidConfig(e.to_string()))
}
