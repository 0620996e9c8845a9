//! The client's view of the realtime message store.
//!
//! [`MessageStore`] is the seam between the session and whatever backs the
//! chat namespace. Two implementations exist: [`LocalMessageStore`] wraps an
//! in-process [`ChatLog`], and [`crate::http_store::HttpMessageStore`] talks
//! to a running `haven-server`.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use haven_shared::protocol::{NewMessage, SendReceipt};
use haven_shared::{ChatError, ChatMessage, MessageId, UserId};
use haven_store::chat_log::Snapshot;
use haven_store::ChatLog;

pub trait MessageStore: Clone + Send + Sync + 'static {
    /// Open a live view of the whole namespace, deleted records included.
    fn subscribe(&self) -> impl Future<Output = Result<Subscription, ChatError>> + Send;

    /// Append a message. The store assigns id and timestamp.
    fn send(&self, message: NewMessage)
        -> impl Future<Output = Result<SendReceipt, ChatError>> + Send;

    /// Mark `id` deleted on behalf of `requester`. Only the owner may do so.
    fn soft_delete(
        &self,
        id: MessageId,
        requester: UserId,
    ) -> impl Future<Output = Result<(), ChatError>> + Send;
}

/// A live feed of full snapshots.
///
/// The first call to [`Subscription::next`] yields the current snapshot
/// right away; later calls wait for the next change. Dropping the
/// subscription releases it and stops any reader task feeding it.
pub struct Subscription {
    rx: watch::Receiver<Snapshot>,
    delivered_initial: bool,
    reader: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self {
            rx,
            delivered_initial: false,
            reader: None,
        }
    }

    /// A subscription whose snapshots are produced by `reader`.
    pub fn with_reader(rx: watch::Receiver<Snapshot>, reader: JoinHandle<()>) -> Self {
        Self {
            rx,
            delivered_initial: false,
            reader: Some(reader),
        }
    }

    /// The latest snapshot, without waiting.
    pub fn snapshot(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// The next snapshot, or `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.rx.borrow_and_update().clone());
        }

        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Explicit form of dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("messages", &self.rx.borrow().len())
            .field("has_reader", &self.reader.is_some())
            .finish()
    }
}

/// Store backed by a [`ChatLog`] living in the same process.
#[derive(Clone)]
pub struct LocalMessageStore {
    log: Arc<ChatLog>,
}

impl LocalMessageStore {
    pub fn new(log: Arc<ChatLog>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<ChatLog> {
        &self.log
    }

    /// The raw snapshot, deleted records included.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.snapshot().to_vec()
    }
}

impl MessageStore for LocalMessageStore {
    async fn subscribe(&self) -> Result<Subscription, ChatError> {
        Ok(Subscription::new(self.log.subscribe()))
    }

    async fn send(&self, message: NewMessage) -> Result<SendReceipt, ChatError> {
        let message = self.log.append(message).await?;
        Ok(SendReceipt {
            id: message.id,
            timestamp: message.timestamp,
        })
    }

    async fn soft_delete(&self, id: MessageId, requester: UserId) -> Result<(), ChatError> {
        self.log.soft_delete(id, &requester).await.map(|_| ())
    }
}
