//! Live Channels - Main entry point.

use anyhow::Result;
use live_channels::start_server;
use live_common::config::Config;
use live_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration, then apply environment overrides
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Live-stream analysis bot v{}", env!("CARGO_PKG_VERSION"));

    // Start the HTTP server
    start_server(&config).await
}
