//! Random image relay.
//!
//! Fetches a random image from an upstream image API, streams it to the
//! caller chunk by chunk, and counts every serve in a SQL ledger.

pub mod config;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod resilience;
pub mod streaming;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
