//! The authoritative chat log.
//!
//! [`ChatLog`] is the single place where writes are accepted. It validates
//! and re-filters every message, enforces the per-identity cooldown from the
//! persisted send log, checks ownership on soft delete, and publishes a full
//! snapshot to every subscriber after each accepted mutation.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use haven_shared::clock::Clock;
use haven_shared::constants::{MAX_MESSAGE_CHARS, MAX_USERNAME_CHARS};
use haven_shared::cooldown::CooldownWindow;
use haven_shared::filter::ContentFilter;
use haven_shared::protocol::NewMessage;
use haven_shared::{validate, ChatError, ChatMessage, MessageId, UserId, ValidationError};

use crate::database::Database;

/// Snapshot type shared with every subscriber.
pub type Snapshot = Arc<Vec<ChatMessage>>;

/// Rules the log applies to incoming writes.
#[derive(Debug, Clone)]
pub struct LogPolicy {
    pub cooldown: CooldownWindow,
    pub max_message_chars: usize,
    pub max_username_chars: usize,
    pub filter: ContentFilter,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            cooldown: CooldownWindow::default(),
            max_message_chars: MAX_MESSAGE_CHARS,
            max_username_chars: MAX_USERNAME_CHARS,
            filter: ContentFilter::default(),
        }
    }
}

pub struct ChatLog {
    db: Mutex<Database>,
    clock: Arc<dyn Clock>,
    policy: LogPolicy,
    snapshots: watch::Sender<Snapshot>,
}

impl ChatLog {
    pub fn new(db: Database, clock: Arc<dyn Clock>, policy: LogPolicy) -> Result<Self, ChatError> {
        let initial = db.list_messages()?;
        info!(messages = initial.len(), "Chat log loaded");

        let (snapshots, _) = watch::channel(Arc::new(initial));

        Ok(Self {
            db: Mutex::new(db),
            clock,
            policy,
            snapshots,
        })
    }

    /// A log over a fresh in-memory database.
    pub fn in_memory(clock: Arc<dyn Clock>, policy: LogPolicy) -> Result<Self, ChatError> {
        Self::new(Database::open_in_memory()?, clock, policy)
    }

    pub fn policy(&self) -> &LogPolicy {
        &self.policy
    }

    /// The current full snapshot, deleted records included.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver whose current value is the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.snapshots.receiver_count()
    }

    /// Validate, filter and append a message.
    pub async fn append(&self, new: NewMessage) -> Result<ChatMessage, ChatError> {
        let text = validate::message_text(&new.text, self.policy.max_message_chars)?;
        let username = validate::username(&new.username, self.policy.max_username_chars)?;

        let clean = NewMessage {
            text: self.policy.filter.apply(&text),
            username: self.policy.filter.apply(&username),
            user_id: new.user_id,
        };

        let db = self.db.lock().await;
        let now = self.clock.now();

        let last = db.last_send_at(&clean.user_id)?;
        let status = self.policy.cooldown.check(last, now);
        if !status.allowed {
            warn!(
                user = %clean.user_id,
                remaining_ms = status.remaining_ms,
                "Send rejected: cooldown active"
            );
            return Err(ValidationError::CooldownActive {
                remaining_ms: status.remaining_ms,
            }
            .into());
        }

        let message = db.append_message(&clean, now)?;
        self.publish(&db);

        info!(msg_id = %message.id, user = %message.user_id, "Message accepted");
        Ok(message)
    }

    /// Soft-delete `id` if `requester` owns it. Repeating the call is a no-op.
    pub async fn soft_delete(
        &self,
        id: MessageId,
        requester: &UserId,
    ) -> Result<ChatMessage, ChatError> {
        let db = self.db.lock().await;
        let now = self.clock.now();

        let outcome = db.soft_delete_message(id, requester, now).map_err(|e| {
            warn!(msg_id = %id, user = %requester, error = %e, "Soft delete rejected");
            ChatError::from(e)
        })?;

        if outcome.changed {
            self.publish(&db);
            info!(msg_id = %id, user = %requester, "Message soft-deleted");
        } else {
            debug!(msg_id = %id, "Message already deleted");
        }

        Ok(outcome.message)
    }

    /// Forget send-log entries whose cooldown has fully elapsed.
    pub async fn purge_expired_cooldowns(&self) -> Result<usize, ChatError> {
        let db = self.db.lock().await;
        let cutoff = self.clock.now() - self.policy.cooldown.duration();
        let removed = db.purge_send_log(cutoff)?;
        if removed > 0 {
            debug!(removed, "Purged expired cooldown entries");
        }
        Ok(removed)
    }

    // The mutation is already committed here, so a failed reload is logged
    // and subscribers keep the previous snapshot until the next publish.
    fn publish(&self, db: &Database) {
        match db.list_messages() {
            Ok(snapshot) => {
                self.snapshots.send_replace(Arc::new(snapshot));
            }
            Err(e) => error!(error = %e, "Failed to reload chat snapshot"),
        }
    }
}
