//! Inbound message type handed from the webhook to the dispatcher.

use chrono::{DateTime, Utc};

/// Message content the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    /// Text with mention markers still in place
    Text { text: String },
    /// Screenshot, referenced by the platform's image key
    Image { image_key: String },
}

/// A message received from Feishu.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Platform message ID
    pub id: String,
    /// Chat the message was posted in
    pub chat_id: String,
    /// Sender open ID, when the platform supplied one
    pub sender_id: Option<String>,
    pub content: InboundContent,
    pub received_at: DateTime<Utc>,
    /// Trace ID for correlating webhook and processing logs
    pub trace_id: String,
}

impl InboundMessage {
    /// Where replies go: the sender directly, or the chat when the sender is unknown.
    pub fn recipient(&self) -> &str {
        self.sender_id.as_deref().unwrap_or(&self.chat_id)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            InboundContent::Text { text } => Some(text),
            InboundContent::Image { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender_id: Option<&str>) -> InboundMessage {
        InboundMessage {
            id: "om_1".into(),
            chat_id: "oc_chat".into(),
            sender_id: sender_id.map(String::from),
            content: InboundContent::Text {
                text: "GMV=1".into(),
            },
            received_at: Utc::now(),
            trace_id: "trace".into(),
        }
    }

    #[test]
    fn test_recipient_prefers_sender() {
        assert_eq!(message(Some("ou_user")).recipient(), "ou_user");
        assert_eq!(message(None).recipient(), "oc_chat");
    }

    #[test]
    fn test_text_accessor() {
        assert_eq!(message(None).text(), Some("GMV=1"));
    }
}
