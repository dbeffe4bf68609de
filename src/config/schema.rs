//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the image relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream image API and the fixed query it receives.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Streaming settings.
    pub streaming: StreamingConfig,

    /// Call ledger settings.
    pub ledger: LedgerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream image API configuration.
///
/// The query values are fixed per deployment; nothing from the inbound
/// request is ever forwarded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the image endpoint.
    pub base_url: String,

    /// `sorting` query value.
    pub sorting: String,

    /// `categories` query value (3-digit code).
    pub categories: String,

    /// `purity` query value (3-digit code).
    pub purity: String,

    /// `resolutions` query value (WxH).
    pub resolutions: String,

    /// Optional API key appended as `apikey`.
    pub api_key: Option<String>,

    /// Optional outbound proxy for all upstream traffic.
    pub proxy: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://capi.lmyself.cloudns.be/img".to_string(),
            sorting: "random".to_string(),
            categories: "010".to_string(),
            purity: "101".to_string(),
            resolutions: "1920x1080".to_string(),
            api_key: None,
            proxy: None,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound processing budget in seconds. Bounds the whole upstream fetch.
    pub request_secs: u64,

    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-attempt upstream timeout in milliseconds.
    ///
    /// This is the HTTP client's total timeout, so it also bounds how long
    /// the image body may take to stream to a slow client. The default is
    /// above `request_secs`: an upstream that accepts the connection and
    /// then hangs gets a single attempt before the fetch budget runs out.
    /// Connect failures still retry within the budget (`connect_secs` is
    /// 30). Set this below `request_secs / max_attempts` to retry hung
    /// responses too.
    pub attempt_ms: u64,

    /// TCP keepalive for upstream connections in seconds.
    pub keepalive_secs: u64,

    /// Budget for a single ledger write in milliseconds.
    pub ledger_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 110,
            connect_secs: 30,
            attempt_ms: 120_000,
            keepalive_secs: 30,
            ledger_ms: 5_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,

    /// Linear backoff step in milliseconds. Attempt `n` waits `n * step`.
    pub backoff_step_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 1_000,
        }
    }
}

/// Streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Bytes read from upstream and written to the client per chunk.
    pub chunk_size: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 32 * 1024,
        }
    }
}

/// How the ledger records a served URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStrategy {
    /// Existence check followed by update or insert. Races under concurrency.
    CheckThenAct,
    /// Single insert-or-increment statement behind the unique key.
    Atomic,
}

/// Call ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Enable the ledger. When disabled, served URLs are not recorded.
    pub enabled: bool,

    /// sqlx connection URL (`mysql://...` or `sqlite:...`).
    pub database_url: String,

    /// Table holding the call counts.
    pub table_name: String,

    /// Upsert strategy.
    pub strategy: UpsertStrategy,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Create the table at startup if missing.
    pub create_table: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_url: "sqlite::memory:".to_string(),
            table_name: "api_calls".to_string(),
            strategy: UpsertStrategy::Atomic,
            max_connections: 5,
            create_table: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
