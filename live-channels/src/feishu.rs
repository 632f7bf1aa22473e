//! Feishu/Lark channel.
//!
//! Uses the Feishu Open Platform Bot API for messaging.
//! Event callbacks arrive over the webhook; encrypted callbacks are decrypted
//! with AES-256-CBC, and replies go out as text or interactive cards.

use crate::card::render_report;
use crate::message::{InboundContent, InboundMessage};
use crate::traits::{ChannelError, ChannelResult, ReportSender};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use async_trait::async_trait;
use base64::Engine;
use live_analysis::Report;
use live_common::config::FeishuConfig;
use live_common::logging::generate_trace_id;
use live_common::error::ResultExt;
use live_common::{Error, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

// ============================================================================
// Constants
// ============================================================================

const FEISHU_API_BASE: &str = "https://open.feishu.cn/open-apis";
const LARK_API_BASE: &str = "https://open.larksuite.com/open-apis";
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 7200;
const AES_BLOCK_SIZE: usize = 16;

pub const MESSAGE_RECEIVE_EVENT: &str = "im.message.receive_v1";
pub const BOT_ADDED_EVENT: &str = "im.chat.member.bot.added_v1";
pub const BOT_DELETED_EVENT: &str = "im.chat.member.bot.deleted_v1";

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TenantAccessTokenResponse {
    code: i32,
    msg: String,
    tenant_access_token: Option<String>,
    expire: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    code: i32,
    msg: String,
    data: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: Option<String>,
}

// ============================================================================
// Event Callback Types
// ============================================================================

/// Event callback body, after decryption.
///
/// Covers both the v1 URL verification shape (`type`, `token`, `challenge` at
/// the top level) and the v2 event shape (`schema`, `header`, `event`).
#[derive(Debug, Deserialize)]
pub struct EventCallback {
    pub schema: Option<String>,
    #[serde(rename = "type")]
    pub callback_type: Option<String>,
    pub token: Option<String>,
    pub challenge: Option<String>,
    pub header: Option<EventHeader>,
    pub event: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct EventHeader {
    #[serde(default)]
    pub event_id: String,
    pub event_type: String,
    pub create_time: Option<String>,
    pub token: Option<String>,
    pub app_id: Option<String>,
}

impl EventCallback {
    /// Verification token, from the v2 header or the v1 body.
    fn verification_token(&self) -> Option<&str> {
        self.header
            .as_ref()
            .and_then(|h| h.token.as_deref())
            .or(self.token.as_deref())
    }

    fn event_type(&self) -> &str {
        self.header
            .as_ref()
            .map(|h| h.event_type.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct MessageReceiveEvent {
    #[serde(default)]
    sender: MessageSender,
    message: FeishuMessage,
}

#[derive(Debug, Default, Deserialize)]
struct MessageSender {
    #[serde(default)]
    sender_id: SenderIds,
}

#[derive(Debug, Default, Deserialize)]
struct SenderIds {
    open_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeishuMessage {
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    chat_id: String,
    #[serde(alias = "msg_type")]
    message_type: String,
    #[serde(default)]
    content: String,
}

/// What the webhook should do with a callback.
#[derive(Debug)]
pub enum WebhookAction {
    /// URL verification; echo the challenge back.
    Challenge(String),
    /// A message for the dispatcher.
    Message(InboundMessage),
    /// Acknowledge without further processing.
    Ack { event_type: String },
}

// ============================================================================
// Token Cache
// ============================================================================

struct TokenCache {
    token: String,
    expires_at: Instant,
}

// ============================================================================
// FeishuChannel
// ============================================================================

/// Feishu/Lark messaging channel.
pub struct FeishuChannel {
    app_id: String,
    app_secret: String,
    encrypt_key: Option<String>,
    verification_token: Option<String>,
    allowed_users: Vec<String>,
    client: reqwest::Client,
    token_cache: Arc<RwLock<Option<TokenCache>>>,
    api_base: String,
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl FeishuChannel {
    /// Create a new Feishu channel.
    pub fn new(app_id: String, app_secret: String, allowed_users: Vec<String>) -> Self {
        Self {
            app_id,
            app_secret,
            encrypt_key: None,
            verification_token: None,
            allowed_users,
            client: build_client(),
            token_cache: Arc::new(RwLock::new(None)),
            api_base: FEISHU_API_BASE.to_string(),
        }
    }

    /// Create from the `feishu` config section.
    pub fn from_config(config: &FeishuConfig) -> Self {
        let channel = Self::new(
            config.app_id.clone(),
            config.app_secret.clone(),
            config.allowed_users.clone(),
        )
        .with_encryption(
            config.encrypt_key.clone(),
            config.verification_token.clone(),
        );

        if config.use_lark {
            channel.with_lark_api()
        } else {
            channel
        }
    }

    /// Enable encrypted callbacks and token verification. Empty strings disable either.
    pub fn with_encryption(
        mut self,
        encrypt_key: Option<String>,
        verification_token: Option<String>,
    ) -> Self {
        self.encrypt_key = encrypt_key.filter(|k| !k.is_empty());
        self.verification_token = verification_token.filter(|t| !t.is_empty());
        self
    }

    /// Use Lark API (international) instead of Feishu (China).
    pub fn with_lark_api(self) -> Self {
        self.with_api_base(LARK_API_BASE)
    }

    /// Point the client at a different API base, e.g. a mock server.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn allows_everyone(&self) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.iter().any(|u| u == "*")
    }

    /// An anonymous sender only passes an open allow-list.
    fn is_user_allowed(&self, open_id: Option<&str>) -> bool {
        self.allows_everyone()
            || open_id.is_some_and(|id| self.allowed_users.iter().any(|u| u == id))
    }

    /// Get or refresh the tenant access token.
    async fn get_access_token(&self) -> anyhow::Result<String> {
        // Check cache first
        {
            let cache = self.token_cache.read().await;
            if let Some(ref cached) = *cache {
                let now = Instant::now();
                if cached.expires_at > now + Duration::from_secs(TOKEN_REFRESH_MARGIN_SECS) {
                    return Ok(cached.token.clone());
                }
            }
        }

        // Refresh token
        let url = self.api_url("/auth/v3/tenant_access_token/internal");
        let body = serde_json::json!({
            "app_id": self.app_id,
            "app_secret": self.app_secret
        });

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Failed to get Feishu access token ({status}): {text}");
        }

        let data: TenantAccessTokenResponse = resp.json().await?;

        if data.code != 0 {
            anyhow::bail!("Feishu API error ({}): {}", data.code, data.msg);
        }

        let token = data
            .tenant_access_token
            .ok_or_else(|| anyhow::anyhow!("Missing tenant_access_token in response"))?;
        let expire = data.expire.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        // Update cache
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(TokenCache {
                token: token.clone(),
                expires_at: Instant::now() + Duration::from_secs(expire),
            });
        }

        tracing::debug!(expire, "Feishu access token refreshed");
        Ok(token)
    }

    /// Post one message. `content` is the JSON-encoded body for `msg_type`.
    async fn send_message(
        &self,
        token: &str,
        receive_id: &str,
        msg_type: &str,
        content: String,
    ) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}?receive_id_type={}",
            self.api_url("/im/v1/messages"),
            receive_id_type(receive_id)
        );

        let body = serde_json::json!({
            "receive_id": receive_id,
            "msg_type": msg_type,
            "content": content
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Feishu sendMessage failed ({status}): {text}");
        }

        let data: SendMessageResponse = resp.json().await?;

        if data.code != 0 {
            anyhow::bail!("Feishu sendMessage error ({}): {}", data.code, data.msg);
        }

        Ok(data.data.and_then(|d| d.message_id))
    }

    async fn deliver(&self, receive_id: &str, msg_type: &str, content: String) -> ChannelResult<()> {
        if self.app_id.is_empty() || self.app_secret.is_empty() {
            return Err(ChannelError::NotConfigured(
                "Feishu app_id and app_secret are required to send".to_string(),
            ));
        }

        let token = self
            .get_access_token()
            .await
            .map_err(|e| ChannelError::Auth(e.to_string()))?;

        let message_id = self
            .send_message(&token, receive_id, msg_type, content)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        tracing::info!(receive_id, msg_type, ?message_id, "Feishu message sent");
        Ok(())
    }

    /// Parse an event callback payload, decrypting it if needed.
    pub fn parse_event(&self, payload: &str) -> Result<EventCallback> {
        let json_value: serde_json::Value =
            serde_json::from_str(payload).context("Invalid Feishu callback body")?;

        let decrypted_payload =
            if let Some(encrypt) = json_value.get("encrypt").and_then(|e| e.as_str()) {
                match &self.encrypt_key {
                    Some(key) => {
                        let decrypted = Self::decrypt_aes_cbc(key, encrypt)
                            .map_err(|e| Error::InvalidInput(e.to_string()))?;
                        tracing::debug!("Feishu event decrypted successfully");
                        decrypted
                    }
                    None => {
                        return Err(Error::InvalidInput(
                            "Received encrypted Feishu event but no encrypt_key configured"
                                .to_string(),
                        ));
                    }
                }
            } else {
                payload.to_string()
            };

        serde_json::from_str(&decrypted_payload).context("Malformed Feishu event")
    }

    /// Decrypt a Feishu encrypted event.
    ///
    /// Key is SHA-256 of the encrypt key; the decoded payload is a 16-byte IV
    /// followed by AES-256-CBC ciphertext with PKCS#7 padding.
    fn decrypt_aes_cbc(encrypt_key: &str, payload_b64: &str) -> anyhow::Result<String> {
        let key: [u8; 32] = Sha256::digest(encrypt_key.as_bytes()).into();

        let data = base64::engine::general_purpose::STANDARD
            .decode(payload_b64)
            .map_err(|e| anyhow::anyhow!("Failed to decode base64 ciphertext: {e}"))?;

        if data.len() < 2 * AES_BLOCK_SIZE || data.len() % AES_BLOCK_SIZE != 0 {
            anyhow::bail!("Encrypted payload has invalid length {}", data.len());
        }

        let (iv, ciphertext) = data.split_at(AES_BLOCK_SIZE);
        let decryptor = Aes256CbcDec::new_from_slices(&key, iv)
            .map_err(|e| anyhow::anyhow!("Invalid AES key or IV: {e}"))?;
        let mut buffer = ciphertext.to_vec();
        let decrypted = decryptor
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|e| anyhow::anyhow!("AES decryption failed: {e}"))?;

        String::from_utf8(decrypted.to_vec())
            .map_err(|e| anyhow::anyhow!("Decrypted content is not valid UTF-8: {e}"))
    }

    fn check_verification_token(&self, event: &EventCallback) -> Result<()> {
        let Some(expected) = self.verification_token.as_deref() else {
            return Ok(());
        };
        match event.verification_token() {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(Error::Auth("Feishu verification token mismatch".to_string())),
            None => Err(Error::Auth("Feishu verification token missing".to_string())),
        }
    }
}

/// `receive_id_type` query value for a recipient ID.
fn receive_id_type(receive_id: &str) -> &'static str {
    if receive_id.starts_with("oc_") {
        "chat_id"
    } else {
        "open_id"
    }
}

/// Text of a text message's `content` field.
///
/// Content is normally `{"text": "..."}`; some relays forward it
/// base64-encoded, so that is tried next, and finally the raw string.
fn extract_text_content(content: &str) -> Option<String> {
    fn text_field(raw: &str) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(raw)
            .ok()?
            .get("text")?
            .as_str()
            .map(str::to_string)
    }

    if let Some(text) = text_field(content) {
        return Some(text);
    }

    let trimmed = content.trim();
    if let Some(decoded) = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    {
        return text_field(&decoded).or(Some(decoded));
    }

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn extract_image_key(content: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()?
        .get("image_key")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl ReportSender for FeishuChannel {
    fn name(&self) -> &'static str {
        "feishu"
    }

    async fn send_card(&self, recipient: &str, report: &Report) -> ChannelResult<()> {
        let card = render_report(report);
        self.deliver(recipient, "interactive", card.to_string())
            .await
    }

    async fn send_text(&self, recipient: &str, text: &str) -> ChannelResult<()> {
        let content = serde_json::json!({ "text": text });
        self.deliver(recipient, "text", content.to_string()).await
    }
}

/// Process an incoming Feishu event callback.
///
/// Called from the webhook handler; never performs network I/O.
pub fn process_event_callback(channel: &FeishuChannel, payload: &str) -> Result<WebhookAction> {
    let event = channel.parse_event(payload)?;
    channel.check_verification_token(&event)?;

    // Handle URL verification challenge
    if event.callback_type.as_deref() == Some("url_verification") || event.challenge.is_some() {
        tracing::info!("Feishu URL verification challenge received");
        return Ok(WebhookAction::Challenge(event.challenge.unwrap_or_default()));
    }

    let event_type = event.event_type().to_string();
    match event_type.as_str() {
        MESSAGE_RECEIVE_EVENT => {}
        BOT_ADDED_EVENT | BOT_DELETED_EVENT => {
            tracing::info!(event_type = %event_type, "Feishu bot membership changed");
            return Ok(WebhookAction::Ack { event_type });
        }
        _ => {
            tracing::info!(event_type = %event_type, "Feishu event ignored");
            return Ok(WebhookAction::Ack { event_type });
        }
    }

    let Some(event_data) = event.event else {
        tracing::warn!("Feishu message event without body");
        return Ok(WebhookAction::Ack { event_type });
    };
    let msg_event: MessageReceiveEvent = serde_json::from_value(event_data)?;

    let sender_id = msg_event.sender.sender_id.open_id;
    if !channel.is_user_allowed(sender_id.as_deref()) {
        tracing::warn!(
            open_id = sender_id.as_deref().unwrap_or("<none>"),
            "Feishu: ignoring message from unauthorized user"
        );
        return Ok(WebhookAction::Ack { event_type });
    }

    let message = msg_event.message;
    let content = match message.message_type.as_str() {
        "text" => extract_text_content(&message.content).map(|text| InboundContent::Text { text }),
        "image" => extract_image_key(&message.content).map(|image_key| InboundContent::Image { image_key }),
        other => {
            tracing::info!(message_type = other, "Feishu message type not handled");
            None
        }
    };

    let Some(content) = content else {
        return Ok(WebhookAction::Ack { event_type });
    };

    if sender_id.is_none() && message.chat_id.is_empty() {
        tracing::warn!(message_id = %message.message_id, "Feishu message has no reply target");
        return Ok(WebhookAction::Ack { event_type });
    }

    Ok(WebhookAction::Message(InboundMessage {
        id: message.message_id,
        chat_id: message.chat_id,
        sender_id,
        content,
        received_at: chrono::Utc::now(),
        trace_id: generate_trace_id(),
    }))
}
