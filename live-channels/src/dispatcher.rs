//! Dispatcher.
//!
//! Takes inbound messages off the webhook queue, runs the analysis pipeline,
//! and sends either the report card or the clarification prompt back.

use std::sync::Arc;

use chrono::Utc;
use live_analysis::{AnalysisPipeline, PipelineOutcome};
use live_common::config::AnalysisConfig;
use live_common::util::{sanitize_for_log, truncate_with_ellipsis};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::message::{InboundContent, InboundMessage};
use crate::traits::{ChannelResult, ImageExtractor, ReportSender};

/// Prefix for the reply to screenshots when no image extractor is configured.
const IMAGE_UNSUPPORTED_PREFIX: &str = "暂不支持截图识别，请直接发送数据。";

/// How a message was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Analysis card sent
    Report,
    /// Metrics were missing; clarification prompt sent
    Clarification,
    /// Screenshot received without an image extractor; prompt sent
    ImageUnsupported,
}

/// Routes inbound messages through the pipeline to a [`ReportSender`].
pub struct Dispatcher {
    pipeline: AnalysisPipeline,
    sender: Arc<dyn ReportSender>,
    image_extractor: Option<Arc<dyn ImageExtractor>>,
    clarification_prompt: String,
}

impl Dispatcher {
    pub fn new(
        pipeline: AnalysisPipeline,
        sender: Arc<dyn ReportSender>,
        clarification_prompt: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            sender,
            image_extractor: None,
            clarification_prompt: clarification_prompt.into(),
        }
    }

    /// Create from the `analysis` config section.
    pub fn from_config(config: &AnalysisConfig, sender: Arc<dyn ReportSender>) -> Self {
        Self::new(
            AnalysisPipeline::from_config(config),
            sender,
            config.clarification_prompt.clone(),
        )
    }

    /// Attach a screenshot reader.
    pub fn with_image_extractor(mut self, extractor: Arc<dyn ImageExtractor>) -> Self {
        self.image_extractor = Some(extractor);
        self
    }

    /// Answer one message.
    pub async fn handle(&self, message: &InboundMessage) -> ChannelResult<Reply> {
        let recipient = message.recipient();

        let outcome = match &message.content {
            InboundContent::Text { text } => {
                tracing::info!(
                    text = %truncate_with_ellipsis(&sanitize_for_log(text), 200),
                    "Analyzing text message"
                );
                self.pipeline.run(text)
            }
            InboundContent::Image { image_key } => match &self.image_extractor {
                Some(extractor) => {
                    tracing::info!(image_key = %image_key, "Extracting metrics from screenshot");
                    let partial = extractor.extract(&message.id, image_key).await?;
                    self.pipeline.run_partial(partial)
                }
                None => {
                    tracing::info!(image_key = %image_key, "Screenshot received, no image extractor");
                    let text = format!("{IMAGE_UNSUPPORTED_PREFIX}\n{}", self.clarification_prompt);
                    self.sender.send_text(recipient, &text).await?;
                    return Ok(Reply::ImageUnsupported);
                }
            },
        };

        match outcome {
            PipelineOutcome::Report(report) => {
                tracing::info!(
                    score = report.score.score,
                    rating = %report.score.rating,
                    "Sending analysis card"
                );
                self.sender.send_card(recipient, &report).await?;
                Ok(Reply::Report)
            }
            PipelineOutcome::InsufficientData { missing, .. } => {
                tracing::info!(?missing, "Sending clarification prompt");
                self.sender
                    .send_text(recipient, &self.clarification_prompt)
                    .await?;
                Ok(Reply::Clarification)
            }
        }
    }

    /// Spawn the queue consumer. Each message is handled in its own task.
    ///
    /// The returned task finishes once the queue is closed and every
    /// in-flight message has been answered.
    pub fn spawn_processor(
        dispatcher: Arc<Self>,
        mut rx: mpsc::Receiver<InboundMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(sender = dispatcher.sender.name(), "Dispatcher started");
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    received = rx.recv() => {
                        let Some(message) = received else { break };
                        in_flight.spawn(Self::process(dispatcher.clone(), message));
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        if let Err(e) = joined {
                            tracing::error!(error = %e, "Message task panicked");
                        }
                    }
                }
            }

            tracing::info!(pending = in_flight.len(), "Dispatcher draining");
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Message task panicked");
                }
            }

            tracing::info!("Dispatcher stopped");
        })
    }

    async fn process(dispatcher: Arc<Self>, message: InboundMessage) {
        let span = tracing::info_span!(
            "dispatch",
            trace_id = %message.trace_id,
            message_id = %message.id
        );

        async move {
            let queued_ms = (Utc::now() - message.received_at).num_milliseconds();
            match dispatcher.handle(&message).await {
                Ok(reply) => tracing::debug!(?reply, queued_ms, "Message handled"),
                Err(e) => tracing::error!(error = %e, queued_ms, "Failed to handle message"),
            }
        }
        .instrument(span)
        .await
    }
}
