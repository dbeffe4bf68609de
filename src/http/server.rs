//! HTTP server setup and the relay handler.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener, stop on the shutdown broadcast
//! - Relay: fetch upstream, stream to client, record the call

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::http::response::{relay_error_response, stream_error_response};
use crate::ledger::CallLedger;
use crate::observability::metrics;
use crate::relay::{RelayError, RelayFetcher};
use crate::streaming::{ChannelSink, StreamError, StreamingResponder};

/// Extra time the outer timeout layer grants beyond the fetch budget, so
/// the fetcher always reports its own failure first.
const TIMEOUT_LAYER_SLACK: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<RelayFetcher>,
    pub responder: StreamingResponder,
    pub ledger: Option<CallLedger>,
}

/// HTTP server for the image relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a server whose fetcher builds its own client from `config`.
    pub fn new(config: RelayConfig, ledger: Option<CallLedger>) -> Result<Self, RelayError> {
        let fetcher = RelayFetcher::from_config(&config)?;
        Ok(Self::with_fetcher(config, fetcher, ledger))
    }

    /// Create a server around an already constructed fetcher.
    pub fn with_fetcher(
        config: RelayConfig,
        fetcher: RelayFetcher,
        ledger: Option<CallLedger>,
    ) -> Self {
        let state = AppState {
            fetcher: Arc::new(fetcher),
            responder: StreamingResponder::new(config.streaming.chunk_size),
            ledger,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let timeout = Duration::from_secs(config.timeouts.request_secs) + TIMEOUT_LAYER_SLACK;

        Router::new()
            .route(
                "/random-image",
                get(random_image_handler).head(head_not_allowed),
            )
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// Router with all layers, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

/// HEAD would otherwise fall through to the GET handler and fetch a whole
/// image only to discard it.
async fn head_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET")])
}

/// Fetch one random image and stream it back.
///
/// The response head goes out as soon as upstream answers; the body is fed
/// by a detached pump task, which records the call once the transfer
/// completes.
async fn random_image_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers());
    let api_url = request.uri().to_string();

    tracing::info!(request_id = %request_id, "Random image requested");

    let upstream = match state.fetcher.fetch(&request_id).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to fetch image");
            metrics::record_request(e.kind(), start);
            return relay_error_response(&e);
        }
    };

    let (mut sink, client_body) = ChannelSink::channel();
    if let Err(e) = state.responder.check_sink(&sink) {
        tracing::error!(request_id = %request_id, error = %e, "Streaming not available");
        metrics::record_request(e.kind(), start);
        return stream_error_response(&e);
    }

    let expected_len = upstream.advertised_len();
    let (headers, mut body) = upstream.into_parts();
    let responder = state.responder;
    let ledger = state.ledger.clone();

    tokio::spawn(async move {
        let result = responder
            .relay(&mut body, &mut sink, expected_len, &request_id)
            .await;
        drop(body);

        match result {
            Ok(report) => {
                metrics::record_bytes_streamed(report.bytes_written, report.short_writes);
                metrics::record_request("ok", start);
                tracing::info!(
                    request_id = %request_id,
                    bytes = report.bytes_written,
                    chunks = report.chunks,
                    elapsed = ?start.elapsed(),
                    "Image streamed"
                );
                drop(sink);

                if let Some(ledger) = ledger {
                    ledger.record_in_background(api_url, request_id);
                }
            }
            Err(e @ StreamError::UpstreamRead { .. }) => {
                metrics::record_request(e.kind(), start);
                tracing::error!(request_id = %request_id, error = %e, "Upstream body broke off");
                sink.fail(io::Error::other("upstream body truncated")).await;
            }
            Err(e) => {
                metrics::record_request(e.kind(), start);
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Client stream aborted, skipping ledger update"
                );
            }
        }
    });

    let mut response = client_body.into_response();
    *response.headers_mut() = headers;
    response
}
