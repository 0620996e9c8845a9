//! [`MessageStore`] over the `haven-server` HTTP API.
//!
//! Snapshots arrive as server-sent events on `/chat/stream`. The reader
//! task reconnects with exponential backoff, so a subscription keeps
//! serving the last known snapshot while offline and catches up when the
//! server is reachable again.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use haven_shared::constants::SNAPSHOT_EVENT;
use haven_shared::protocol::{sort_messages, ErrorBody, NewMessage, SendReceipt, SoftDeleteRequest};
use haven_shared::{ChatError, ChatMessage, MessageId, UserId};
use haven_store::chat_log::Snapshot;

use crate::store_client::{MessageStore, Subscription};

/// First reconnect delay of the snapshot stream
pub const RECONNECT_INITIAL: Duration = Duration::from_secs(1);

/// Ceiling of the reconnect delay
pub const RECONNECT_MAX: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpMessageStore {
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl HttpMessageStore {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn fetch_snapshot(&self) -> Result<Vec<ChatMessage>, ChatError> {
        let resp = self
            .client
            .get(self.url("/chat/messages"))
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        let mut messages: Vec<ChatMessage> = resp.json().await.map_err(transport_error)?;
        sort_messages(&mut messages);
        Ok(messages)
    }
}

impl MessageStore for HttpMessageStore {
    async fn subscribe(&self) -> Result<Subscription, ChatError> {
        let initial = self.fetch_snapshot().await?;
        debug!(messages = initial.len(), "Fetched initial snapshot");

        let (tx, rx) = watch::channel::<Snapshot>(Arc::new(initial));
        let reader = tokio::spawn(stream_snapshots(
            self.client.clone(),
            self.url("/chat/stream"),
            tx,
        ));

        Ok(Subscription::with_reader(rx, reader))
    }

    async fn send(&self, message: NewMessage) -> Result<SendReceipt, ChatError> {
        let resp = self
            .client
            .post(self.url("/chat/messages"))
            .json(&message)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        resp.json().await.map_err(transport_error)
    }

    async fn soft_delete(&self, id: MessageId, requester: UserId) -> Result<(), ChatError> {
        let resp = self
            .client
            .post(self.url(&format!("/chat/messages/{id}/soft-delete")))
            .json(&SoftDeleteRequest { user_id: requester })
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(())
    }
}

fn transport_error(e: reqwest::Error) -> ChatError {
    ChatError::StoreUnavailable(e.to_string())
}

async fn error_from_response(resp: reqwest::Response) -> ChatError {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => body.into_chat_error(),
        Err(_) => ChatError::StoreUnavailable(format!("Chat service returned {status}")),
    }
}

/// Keep `tx` fed from the event stream until every receiver is gone.
async fn stream_snapshots(client: reqwest::Client, url: String, tx: watch::Sender<Snapshot>) {
    let mut backoff = Backoff::new(RECONNECT_INITIAL, RECONNECT_MAX);

    while !tx.is_closed() {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(url = %url, "Snapshot stream connected");
                backoff.reset();

                let mut decoder = SseDecoder::default();
                let mut body = resp.bytes_stream();
                while let Some(chunk) = body.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!(error = %e, "Snapshot stream interrupted");
                            break;
                        }
                    };

                    for event in decoder.feed(&chunk) {
                        if event.event != SNAPSHOT_EVENT {
                            continue;
                        }
                        match serde_json::from_str::<Vec<ChatMessage>>(&event.data) {
                            Ok(mut messages) => {
                                sort_messages(&mut messages);
                                tx.send_replace(Arc::new(messages));
                            }
                            Err(e) => warn!(error = %e, "Discarding malformed snapshot"),
                        }
                    }
                }
            }
            Ok(resp) => warn!(status = %resp.status(), "Snapshot stream refused"),
            Err(e) => warn!(error = %e, "Snapshot stream unreachable"),
        }

        if tx.is_closed() {
            break;
        }
        let delay = backoff.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "Reconnecting snapshot stream");
        tokio::time::sleep(delay).await;
    }

    debug!("Snapshot stream reader stopped");
}

/// Doubling delay between `initial` and `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser. Chunks may split lines and
/// events anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Consume a chunk and return every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&block[..end]) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(block);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        // Comments carry keep-alives.
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }

    Some(SseEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_split_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"event: snap").is_empty());
        assert!(decoder.feed(b"shot\r\ndata: [1,").is_empty());

        let events = decoder.feed(b"2]\r\n\r\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "snapshot".into(),
                data: "[1,2]".into()
            }]
        );
    }

    #[test]
    fn test_skips_keep_alive_comments() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b":\n\n: ping\n\nevent:snapshot\ndata:[]\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[]");
    }

    #[test]
    fn test_multiline_data_and_default_event() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut backoff = Backoff::new(RECONNECT_INITIAL, RECONNECT_MAX);
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), RECONNECT_INITIAL);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let store = HttpMessageStore::new("http://localhost:8080/");
        assert_eq!(store.url("/chat/messages"), "http://localhost:8080/chat/messages");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let store = HttpMessageStore::new("http://127.0.0.1:9");
        let err = store.subscribe().await.unwrap_err();
        assert!(matches!(err, ChatError::StoreUnavailable(_)));
    }

    mod against_server {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};

        use axum::response::sse::{Event, Sse};
        use axum::routing::get;
        use axum::{Json, Router};
        use chrono::{DateTime, TimeZone, Utc};
        use haven_server::api::{build_router, AppState};
        use haven_server::config::ServerConfig;
        use haven_shared::clock::ManualClock;
        use haven_shared::ValidationError;
        use haven_store::{ChatLog, LogPolicy};

        fn t0() -> DateTime<Utc> {
            Utc.timestamp_millis_opt(1_760_000_000_000).unwrap()
        }

        fn chat_log() -> Arc<ChatLog> {
            let clock = ManualClock::new(t0());
            Arc::new(ChatLog::in_memory(Arc::new(clock), LogPolicy::default()).unwrap())
        }

        async fn serve(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            format!("http://{addr}")
        }

        async fn haven_server(log: Arc<ChatLog>) -> HttpMessageStore {
            let app = build_router(AppState {
                chat: log,
                config: Arc::new(ServerConfig::default()),
            });
            HttpMessageStore::new(&serve(app).await)
        }

        fn message(user: &str, text: &str) -> NewMessage {
            NewMessage {
                text: text.to_string(),
                username: "Fern".to_string(),
                user_id: UserId::new(user),
            }
        }

        async fn next_matching(
            sub: &mut Subscription,
            wanted: impl Fn(&[ChatMessage]) -> bool,
        ) -> Snapshot {
            tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    let snapshot = sub.next().await.expect("subscription closed");
                    if wanted(&snapshot) {
                        return snapshot;
                    }
                }
            })
            .await
            .expect("no matching snapshot in time")
        }

        #[tokio::test]
        async fn test_send_returns_receipt() {
            let log = chat_log();
            let store = haven_server(log.clone()).await;

            let receipt = store.send(message("u1", "hello")).await.unwrap();
            assert_eq!(receipt.timestamp, t0());

            let stored = log.snapshot();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].id, receipt.id);
            assert_eq!(stored[0].text, "hello");
        }

        #[tokio::test]
        async fn test_subscribe_receives_live_snapshots() {
            let log = chat_log();
            let store = haven_server(log).await;
            let mut sub = store.subscribe().await.unwrap();
            assert!(sub.next().await.unwrap().is_empty());

            let receipt = store.send(message("u1", "first")).await.unwrap();
            let snapshot = next_matching(&mut sub, |s| s.iter().any(|m| m.id == receipt.id)).await;
            assert_eq!(snapshot.len(), 1);

            store.soft_delete(receipt.id, UserId::new("u1")).await.unwrap();
            let snapshot = next_matching(&mut sub, |s| s.iter().any(|m| m.is_deleted)).await;
            assert_eq!(snapshot[0].deleted_at, Some(t0()));
        }

        #[tokio::test]
        async fn test_error_responses_map_to_chat_errors() {
            let store = haven_server(chat_log()).await;
            let receipt = store.send(message("u1", "mine")).await.unwrap();

            let err = store.send(message("u1", "again")).await.unwrap_err();
            assert_eq!(
                err,
                ChatError::Validation(ValidationError::CooldownActive { remaining_ms: 30_000 })
            );

            let err = store.soft_delete(receipt.id, UserId::new("u2")).await.unwrap_err();
            assert!(matches!(err, ChatError::PermissionDenied(_)));

            let missing = MessageId::new();
            let err = store.soft_delete(missing, UserId::new("u1")).await.unwrap_err();
            assert_eq!(err, ChatError::NotFound(missing));

            let err = store.send(message("u3", "   ")).await.unwrap_err();
            assert_eq!(err, ChatError::Validation(ValidationError::EmptyMessage));
        }

        #[tokio::test]
        async fn test_stream_reconnects_after_server_closes_it() {
            let log = chat_log();
            let connections = Arc::new(AtomicUsize::new(0));

            // Each stream connection carries one snapshot and then ends.
            let app = Router::new()
                .route(
                    "/chat/messages",
                    get({
                        let log = log.clone();
                        move || {
                            let log = log.clone();
                            async move { Json(log.snapshot().to_vec()) }
                        }
                    }),
                )
                .route(
                    "/chat/stream",
                    get({
                        let log = log.clone();
                        let connections = connections.clone();
                        move || {
                            let event = Event::default()
                                .event(SNAPSHOT_EVENT)
                                .json_data(log.snapshot().to_vec());
                            connections.fetch_add(1, Ordering::SeqCst);
                            async move { Sse::new(futures::stream::once(async move { event })) }
                        }
                    }),
                );
            let store = HttpMessageStore::new(&serve(app).await);

            let mut sub = store.subscribe().await.unwrap();
            assert!(sub.next().await.unwrap().is_empty());

            tokio::time::timeout(Duration::from_secs(5), async {
                while connections.load(Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await
            .unwrap();

            log.append(message("u1", "while away")).await.unwrap();

            let snapshot = next_matching(&mut sub, |s| s.len() == 1).await;
            assert_eq!(snapshot[0].text, "while away");
            assert!(connections.load(Ordering::SeqCst) >= 2);
        }
    }
}
