//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env / .env.local / $ENV_FILE
//!     → loader.rs (populate process environment)
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_env_files, ConfigError};
pub use schema::{
    LedgerConfig, ListenerConfig, LogFormat, ObservabilityConfig, RelayConfig, RetryConfig,
    StreamingConfig, TimeoutConfig, UpsertStrategy, UpstreamConfig,
};
