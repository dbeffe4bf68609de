//! Startup orchestration.
//!
//! # Order
//! 1. Metrics exporter (optional)
//! 2. Ledger pool, then the table if configured
//! 3. Upstream client and HTTP server
//! 4. Listener, last, so traffic only arrives when everything is ready
//!
//! Any startup error is fatal; nothing is retried here.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::http::HttpServer;
use crate::ledger::{CallLedger, LedgerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;
use crate::observability::metrics;
use crate::relay::RelayError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("upstream: {0}")]
    Relay(#[from] RelayError),
    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect the ledger described by `config`, or `None` when disabled.
pub async fn connect_ledger(config: &RelayConfig) -> Result<Option<CallLedger>, LedgerError> {
    if !config.ledger.enabled {
        tracing::warn!("Ledger disabled, served URLs will not be recorded");
        return Ok(None);
    }

    let mut ledger = CallLedger::connect(
        &config.ledger,
        Duration::from_millis(config.timeouts.ledger_ms),
    )
    .await?;

    if config.ledger.create_table {
        ledger.ensure_table().await?;
    }

    Ok(Some(ledger))
}

/// Start every subsystem and serve until a shutdown signal arrives.
pub async fn run(config: RelayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let ledger = connect_ledger(&config).await?;
    let server = HttpServer::new(config.clone(), ledger.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        upstream = %config.upstream.base_url,
        chunk_size = config.streaming.chunk_size,
        max_attempts = config.retries.max_attempts,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    wait_for_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }

    if let Some(ledger) = ledger {
        ledger.close().await;
    }

    Ok(())
}
