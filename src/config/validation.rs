//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, chunk size, attempts)
//! - Reject upstream URLs that cannot be parsed
//! - Reject ledger table names that are not plain identifiers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// Largest chunk the streaming responder will allocate per request.
const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),
    #[error("upstream.base_url '{url}' is invalid: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("upstream.proxy '{0}' is not a valid URL")]
    ProxyUrl(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("streaming.chunk_size {0} exceeds {MAX_CHUNK_SIZE} bytes")]
    ChunkTooLarge(usize),
    #[error("ledger.table_name '{0}' must be a plain SQL identifier")]
    TableName(String),
    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.push(ValidationError::BaseUrl {
                url: config.upstream.base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::BaseUrl {
            url: config.upstream.base_url.clone(),
            reason: e.to_string(),
        }),
    }

    if let Some(proxy) = &config.upstream.proxy {
        if Url::parse(proxy).is_err() {
            errors.push(ValidationError::ProxyUrl(proxy.clone()));
        }
    }

    let positives: [(&'static str, u64); 6] = [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.attempt_ms", config.timeouts.attempt_ms),
        ("timeouts.ledger_ms", config.timeouts.ledger_ms),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("streaming.chunk_size", config.streaming.chunk_size as u64),
    ];
    for (name, value) in positives {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    if config.streaming.chunk_size > MAX_CHUNK_SIZE {
        errors.push(ValidationError::ChunkTooLarge(config.streaming.chunk_size));
    }

    if config.ledger.enabled {
        if !is_identifier(&config.ledger.table_name) {
            errors.push(ValidationError::TableName(config.ledger.table_name.clone()));
        }
        if config.ledger.max_connections == 0 {
            errors.push(ValidationError::Zero("ledger.max_connections"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The table name is interpolated into SQL text, so only `[A-Za-z_][A-Za-z0-9_]*` passes.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
