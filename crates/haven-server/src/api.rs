use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::WatchStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use haven_shared::constants::{CHAT_NAMESPACE, SNAPSHOT_EVENT};
use haven_shared::protocol::{NewMessage, SendReceipt, SoftDeleteRequest};
use haven_shared::{ChatMessage, MessageId};
use haven_store::ChatLog;

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatLog>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/chat/messages", get(list_messages).post(send_message))
        .route("/chat/messages/:id/soft-delete", post(soft_delete_message))
        .route("/chat/stream", get(stream_messages))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    namespace: &'static str,
    send_cooldown_ms: u64,
    max_message_chars: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    let policy = state.chat.policy();
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        namespace: CHAT_NAMESPACE,
        send_cooldown_ms: policy.cooldown.as_millis(),
        max_message_chars: policy.max_message_chars,
    })
}

/// Full snapshot of the namespace, deleted records included.
async fn list_messages(State(state): State<AppState>) -> Json<Vec<ChatMessage>> {
    Json(state.chat.snapshot().to_vec())
}

async fn send_message(
    State(state): State<AppState>,
    body: Result<Json<NewMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<SendReceipt>), ServerError> {
    let Json(new) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let message = state.chat.append(new).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendReceipt {
            id: message.id,
            timestamp: message.timestamp,
        }),
    ))
}

async fn soft_delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SoftDeleteRequest>, JsonRejection>,
) -> Result<Json<ChatMessage>, ServerError> {
    let id = MessageId::parse(&id)
        .map_err(|e| ServerError::BadRequest(format!("Invalid message id: {e}")))?;
    let Json(req) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let message = state.chat.soft_delete(id, &req.user_id).await?;
    Ok(Json(message))
}

/// Server-sent events: one `snapshot` event right away, then one after
/// every accepted mutation.
async fn stream_messages(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.chat.subscribe();
    debug!(subscribers = state.chat.subscriber_count(), "Chat stream opened");

    let stream = WatchStream::new(rx)
        .map(|snapshot| Event::default().event(SNAPSHOT_EVENT).json_data(&*snapshot));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, Response};
    use chrono::{Duration, TimeZone, Utc};
    use haven_shared::clock::ManualClock;
    use haven_shared::protocol::ErrorBody;
    use haven_store::LogPolicy;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn setup() -> (Router, ManualClock) {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_760_000_000_000).unwrap());
        let chat = ChatLog::in_memory(Arc::new(clock.clone()), LogPolicy::default()).unwrap();
        let state = AppState {
            chat: Arc::new(chat),
            config: Arc::new(ServerConfig::default()),
        };
        (build_router(state), clock)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(resp: Response<Body>) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(app: &Router, user: &str, text: &str) -> Response<Body> {
        app.clone()
            .oneshot(post_json(
                "/chat/messages",
                serde_json::json!({ "text": text, "username": "User2024", "userId": user }),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup();
        let resp = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_send_then_list() {
        let (app, _) = setup();

        let resp = send(&app, "user_a", "hello").await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let receipt: SendReceipt = json(resp).await;

        let resp = app.clone().oneshot(get("/chat/messages")).await.unwrap();
        let messages: Vec<ChatMessage> = json(resp).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, receipt.id);
        assert_eq!(messages[0].text, "hello");
        assert!(!messages[0].is_deleted);
    }

    #[tokio::test]
    async fn test_cooldown_is_429_with_remaining() {
        let (app, clock) = setup();
        send(&app, "user_a", "one").await;
        clock.advance(Duration::seconds(5));

        let resp = send(&app, "user_a", "two").await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: ErrorBody = json(resp).await;
        assert_eq!(body.code, "cooldown_active");
        assert_eq!(body.remaining_ms, Some(25_000));
    }

    #[tokio::test]
    async fn test_empty_message_is_400() {
        let (app, _) = setup();
        let resp = send(&app, "user_a", "   ").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json(resp).await;
        assert_eq!(body.code, "empty_message");
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let (app, _) = setup();
        let resp = app
            .oneshot(post_json("/chat/messages", serde_json::json!({ "text": "hi" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json(resp).await;
        assert_eq!(body.code, "bad_request");
    }

    #[tokio::test]
    async fn test_soft_delete_rules() {
        let (app, _) = setup();
        let receipt: SendReceipt = json(send(&app, "user_b", "mine").await).await;
        let uri = format!("/chat/messages/{}/soft-delete", receipt.id);

        let resp = app
            .clone()
            .oneshot(post_json(&uri, serde_json::json!({ "userId": "user_a" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app
            .clone()
            .oneshot(post_json(&uri, serde_json::json!({ "userId": "user_b" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let deleted: ChatMessage = json(resp).await;
        assert!(deleted.is_deleted);
        assert!(deleted.deleted_at.is_some());

        let resp = app
            .clone()
            .oneshot(post_json(
                &format!("/chat/messages/{}/soft-delete", MessageId::new()),
                serde_json::json!({ "userId": "user_b" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(post_json(
                "/chat/messages/not-a-uuid/soft-delete",
                serde_json::json!({ "userId": "user_b" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stream_sends_snapshot_immediately() {
        let (app, _) = setup();
        send(&app, "user_a", "hello").await;

        let resp = app.oneshot(get("/chat/stream")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let mut body = resp.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.contains(SNAPSHOT_EVENT), "{text}");
        assert!(text.contains("\"text\":\"hello\""), "{text}");
    }
}
