//! HTTP routes for the bot's webhook server.
//!
//! - `GET /` service banner
//! - `GET /health`, `GET /ready` probes
//! - `GET|POST /api/feishu/webhook` Feishu event subscription (alias `POST /webhook/feishu`)

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::feishu::{self, FeishuChannel, WebhookAction};
use crate::message::InboundMessage;

const SERVICE_NAME: &str = "live-channels";
const MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// State
// ============================================================================

/// Shared state for the HTTP server.
pub struct ChannelsState {
    /// Feishu channel instance (if configured)
    pub feishu: Option<Arc<FeishuChannel>>,
    /// Queue feeding the dispatcher
    pub message_tx: mpsc::Sender<InboundMessage>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Feishu-facing webhook reply. A URL verification reply carries only the
/// challenge; everything else carries `code`/`msg`.
#[derive(Debug, Serialize, Deserialize)]
struct WebhookResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    challenge: Option<String>,
}

impl WebhookResponse {
    fn challenge(challenge: String) -> Self {
        Self {
            code: None,
            msg: None,
            challenge: Some(challenge),
        }
    }

    fn success() -> Self {
        Self {
            code: Some(0),
            msg: Some("success".to_string()),
            challenge: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            code: Some(-1),
            msg: Some(msg.into()),
            challenge: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    challenge: Option<String>,
}

// ============================================================================
// Health Routes
// ============================================================================

async fn index() -> &'static str {
    "Live-stream analysis bot is running"
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready(State(state): State<Arc<ChannelsState>>) -> impl IntoResponse {
    // Check if the dispatcher queue is still open
    if state.message_tx.is_closed() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready",
                service: SERVICE_NAME,
                version: env!("CARGO_PKG_VERSION"),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ready",
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

// ============================================================================
// Feishu Webhook
// ============================================================================

async fn feishu_verify(Query(query): Query<VerifyQuery>) -> impl IntoResponse {
    match query.challenge.filter(|c| !c.is_empty()) {
        Some(challenge) => {
            tracing::info!("Feishu GET URL verification");
            Json(WebhookResponse::challenge(challenge))
        }
        None => {
            tracing::warn!("Feishu GET request without challenge");
            Json(WebhookResponse::success())
        }
    }
}

async fn feishu_webhook(
    State(state): State<Arc<ChannelsState>>,
    body: String,
) -> impl IntoResponse {
    let Some(ref feishu) = state.feishu else {
        return (
            StatusCode::NOT_FOUND,
            Json(WebhookResponse::error("Feishu channel not configured")),
        );
    };

    match feishu::process_event_callback(feishu, &body) {
        Ok(WebhookAction::Challenge(challenge)) => {
            (StatusCode::OK, Json(WebhookResponse::challenge(challenge)))
        }
        Ok(WebhookAction::Message(message)) => {
            tracing::info!(
                trace_id = %message.trace_id,
                message_id = %message.id,
                "Feishu message queued"
            );
            if let Err(e) = state.message_tx.send(message).await {
                tracing::error!(error = %e, "Failed to forward Feishu message");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(WebhookResponse::error(format!("Failed to forward message: {e}"))),
                );
            }
            (StatusCode::OK, Json(WebhookResponse::success()))
        }
        Ok(WebhookAction::Ack { .. }) => (StatusCode::OK, Json(WebhookResponse::success())),
        Err(e) => {
            tracing::error!(error = %e, "Feishu webhook error");
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            (status, Json(WebhookResponse::error(e.to_string())))
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the HTTP router.
pub fn build_router(state: Arc<ChannelsState>) -> Router {
    Router::new()
        .route("/", get(index))
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Feishu event subscription
        .route(
            "/api/feishu/webhook",
            get(feishu_verify).post(feishu_webhook),
        )
        .route("/webhook/feishu", post(feishu_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Create the server state and the receiving end of the dispatcher queue.
pub fn create_state(
    feishu: Option<Arc<FeishuChannel>>,
    queue_capacity: usize,
) -> (Arc<ChannelsState>, mpsc::Receiver<InboundMessage>) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));

    let state = Arc::new(ChannelsState {
        feishu,
        message_tx: tx,
    });

    (state, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn feishu() -> Arc<FeishuChannel> {
        Arc::new(FeishuChannel::new("app".into(), "secret".into(), vec![]))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _rx) = create_state(None, 10);
        let response = build_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn test_ready_reflects_queue() {
        let (state, rx) = create_state(None, 10);
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        drop(rx);
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_get_verify_with_challenge() {
        let (state, _rx) = create_state(None, 10);
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/feishu/webhook?challenge=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"challenge": "abc123"}));
    }

    #[tokio::test]
    async fn test_get_verify_without_challenge() {
        let (state, _rx) = create_state(None, 10);
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/feishu/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_json(response).await, json!({"code": 0, "msg": "success"}));
    }

    #[tokio::test]
    async fn test_webhook_not_configured() {
        let (state, _rx) = create_state(None, 10);
        let response = build_router(state)
            .oneshot(post_json("/api/feishu/webhook", "{}".into()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_challenge() {
        let (state, _rx) = create_state(Some(feishu()), 10);
        let body = json!({"type": "url_verification", "challenge": "c-1", "token": "t"});
        let response = build_router(state)
            .oneshot(post_json("/api/feishu/webhook", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"challenge": "c-1"}));
    }

    #[tokio::test]
    async fn test_webhook_invalid_json() {
        let (state, _rx) = create_state(Some(feishu()), 10);
        let response = build_router(state)
            .oneshot(post_json("/api/feishu/webhook", "not json".into()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], -1);
        assert!(json["msg"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn test_webhook_token_mismatch_unauthorized() {
        let channel = FeishuChannel::new("app".into(), "secret".into(), vec![])
            .with_encryption(None, Some("expected".into()));
        let (state, _rx) = create_state(Some(Arc::new(channel)), 10);
        let body = json!({"type": "url_verification", "challenge": "c", "token": "wrong"});
        let response = build_router(state)
            .oneshot(post_json("/api/feishu/webhook", body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_forwards_text_message() {
        let (state, mut rx) = create_state(Some(feishu()), 10);
        let body = json!({
            "schema": "2.0",
            "header": { "event_id": "e1", "event_type": "im.message.receive_v1" },
            "event": {
                "sender": { "sender_id": { "open_id": "ou_1" } },
                "message": {
                    "message_id": "om_1",
                    "chat_id": "oc_1",
                    "message_type": "text",
                    "content": "{\"text\":\"GMV=1000, 观众=5000, 订单=50\"}"
                }
            }
        });
        let response = build_router(state)
            .oneshot(post_json("/webhook/feishu", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"code": 0, "msg": "success"}));

        let message = rx.try_recv().unwrap();
        assert_eq!(message.id, "om_1");
        assert_eq!(message.text(), Some("GMV=1000, 观众=5000, 订单=50"));
    }

    #[tokio::test]
    async fn test_webhook_other_event_acknowledged() {
        let (state, mut rx) = create_state(Some(feishu()), 10);
        let body = json!({
            "schema": "2.0",
            "header": { "event_type": "im.chat.member.bot.added_v1" },
            "event": {}
        });
        let response = build_router(state)
            .oneshot(post_json("/api/feishu/webhook", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"code": 0, "msg": "success"}));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_index_banner() {
        let (state, _rx) = create_state(None, 10);
        let response = build_router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
