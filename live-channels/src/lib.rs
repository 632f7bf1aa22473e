//! Live Channels - Feishu front end for the live-stream analysis bot.
//!
//! ## Architecture
//!
//! The webhook acknowledges Feishu immediately and queues the message; the
//! dispatcher runs the analysis pipeline and replies through the Feishu API.
//!
//! ```text
//! Feishu → webhook → queue → Dispatcher → AnalysisPipeline
//!                                 ↓
//! Feishu ←── card / prompt ── FeishuChannel
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod card;
pub mod dispatcher;
pub mod feishu;
pub mod message;
pub mod routes;
pub mod traits;

// Re-export commonly used types
pub use card::render_report;
pub use dispatcher::{Dispatcher, Reply};
pub use feishu::{process_event_callback, FeishuChannel, WebhookAction};
pub use message::{InboundContent, InboundMessage};
pub use routes::{build_router, create_state, ChannelsState};
pub use traits::{ChannelError, ChannelResult, ImageExtractor, ReportSender};

use live_common::config::Config;
use live_common::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// How long shutdown waits for queued messages to be answered.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the router with CORS middleware.
///
/// Returns the dispatcher queue receiver and the Feishu channel (if enabled)
/// so the caller can wire up the dispatcher.
pub fn build_channels_router(
    config: &Config,
) -> (
    axum::Router,
    tokio::sync::mpsc::Receiver<InboundMessage>,
    Option<Arc<FeishuChannel>>,
) {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create Feishu channel if configured
    let feishu = match &config.feishu {
        Some(f) if config.feishu_enabled() => Some(Arc::new(FeishuChannel::from_config(f))),
        _ => None,
    };

    let (state, rx) = create_state(feishu.clone(), config.server.queue_capacity);
    let router = build_router(state).layer(cors);

    (router, rx, feishu)
}

/// Start the HTTP server and the dispatcher.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    if let Err(problems) = config.validate() {
        return Err(Error::Config(problems.join("; ")).into());
    }

    let addr = SocketAddr::from((
        config.server.bind.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let (router, rx, feishu) = build_channels_router(config);

    // Spawn the dispatcher; without a channel to reply on, the queue is closed
    // and /ready reports not_ready.
    let processor_handle = match feishu {
        Some(feishu) => {
            let dispatcher = Arc::new(Dispatcher::from_config(&config.analysis, feishu));
            Some(Dispatcher::spawn_processor(dispatcher, rx))
        }
        None => {
            tracing::warn!("Feishu channel not enabled; webhook messages will be rejected");
            drop(rx);
            None
        }
    };

    tracing::info!("Starting live-stream analysis bot on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the queue sender) is dropped once serve returns,
    // so the processor finishes in-flight replies and exits.
    if let Some(handle) = processor_handle {
        match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Dispatcher task failed"),
            Err(_) => tracing::warn!("Dispatcher did not drain before shutdown timeout"),
        }
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
