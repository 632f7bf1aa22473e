//! Seams between the dispatcher and the outside world.

use async_trait::async_trait;
use live_analysis::{PartialMetrics, Report};

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Delivers replies to the messaging platform.
///
/// Implementations own authentication and transport; callers treat a send as
/// fire-and-forget and only log failures.
#[async_trait]
pub trait ReportSender: Send + Sync {
    /// Sender name, used in logs.
    fn name(&self) -> &'static str;

    /// Send an analysis report as an interactive card.
    async fn send_card(&self, recipient: &str, report: &Report) -> ChannelResult<()>;

    /// Send a plain text message.
    async fn send_text(&self, recipient: &str, text: &str) -> ChannelResult<()>;
}

/// Reads metrics out of a screenshot.
///
/// No implementation ships with this crate; image messages get the
/// clarification prompt unless one is plugged in.
#[async_trait]
pub trait ImageExtractor: Send + Sync {
    async fn extract(&self, message_id: &str, image_key: &str) -> ChannelResult<PartialMetrics>;
}
