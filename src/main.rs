//! Random image relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                  IMAGE RELAY                  │
//!     GET /random-image   │  ┌─────────┐    ┌─────────┐    ┌───────────┐  │
//!     ────────────────────┼─▶│  http   │───▶│  relay  │───▶│  upstream │──┼──▶ Image API
//!                         │  │ server  │    │ fetcher │    │  (retry)  │  │
//!                         │  └─────────┘    └─────────┘    └─────┬─────┘  │
//!                         │                                      │        │
//!     image bytes         │  ┌─────────┐    ┌───────────┐        │        │
//!     ◀───────────────────┼──│  body   │◀───│ streaming │◀───────┘        │
//!                         │  │ channel │    │ responder │                 │
//!                         │  └─────────┘    └─────┬─────┘                 │
//!                         │                       ▼                       │
//!                         │                 ┌───────────┐                 │
//!                         │                 │  ledger   │─────────────────┼──▶ MySQL / SQLite
//!                         │                 └───────────┘                 │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use image_relay::config::{load_config, load_env_files};
use image_relay::lifecycle::startup;
use image_relay::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "image-relay")]
#[command(about = "Relay random images from an upstream API and count every serve", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_file = load_env_files()?;
    let config = load_config(cli.config.as_deref())?;

    init_logging(&config.observability)?;

    tracing::info!("image-relay v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(path) = env_file {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    if cli.check {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
