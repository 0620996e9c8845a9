//! One user's chat session.
//!
//! [`ChatSession`] composes the injected identity, the content filter, the
//! client-side cooldown and a [`MessageStore`]. Everything a chat widget
//! does goes through it: sending, deleting, renaming, subscribing and
//! projecting snapshots for display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use haven_shared::clock::{Clock, SystemClock};
use haven_shared::constants::MAX_MESSAGE_CHARS;
use haven_shared::cooldown::{CooldownStatus, CooldownWindow};
use haven_shared::filter::ContentFilter;
use haven_shared::protocol::{NewMessage, SendReceipt};
use haven_shared::{validate, ChatError, ChatMessage, LocalIdentity, ValidationError};

use crate::identity::IdentityContext;
use crate::rate_limiter::{read_status, CooldownTicker, SendCooldown};
use crate::store_client::{MessageStore, Subscription};
use crate::view::{self, ChatView};

pub struct ChatSession<S: MessageStore> {
    identity: Arc<IdentityContext>,
    store: S,
    filter: Arc<ContentFilter>,
    cooldown: Arc<Mutex<SendCooldown>>,
    in_flight: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl<S: MessageStore> ChatSession<S> {
    pub fn new(identity: Arc<IdentityContext>, store: S) -> Self {
        Self {
            identity,
            store,
            filter: Arc::new(ContentFilter::default()),
            cooldown: Arc::new(Mutex::new(SendCooldown::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_filter(mut self, filter: ContentFilter) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cooldown_window(mut self, window: CooldownWindow) -> Self {
        self.cooldown = Arc::new(Mutex::new(SendCooldown::new(window)));
        self
    }

    pub fn identity(&self) -> LocalIdentity {
        self.identity.current()
    }

    pub fn cooldown(&self) -> CooldownStatus {
        read_status(&self.cooldown, self.clock.as_ref())
    }

    pub fn last_send_at(&self) -> Option<DateTime<Utc>> {
        self.lock_cooldown().last_send_at()
    }

    /// A once-per-second countdown feed. Stops when dropped.
    pub fn cooldown_ticker(&self) -> CooldownTicker {
        CooldownTicker::spawn(self.cooldown.clone(), self.clock.clone())
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn subscribe(&self) -> Result<Subscription, ChatError> {
        self.store.subscribe().await.map_err(|e| {
            warn!(error = %e, "Chat subscription failed");
            e
        })
    }

    /// Validate, rate-limit and filter `text`, then hand it to the store.
    ///
    /// The store call runs on its own task: dropping the returned future
    /// does not cancel a send that has already been dispatched.
    pub async fn send(&self, text: &str) -> Result<SendReceipt, ChatError> {
        let text = validate::message_text(text, MAX_MESSAGE_CHARS)
            .map_err(|e| rejected(e.into()))?;

        let Some(in_flight) = InFlight::acquire(&self.in_flight) else {
            return Err(rejected(ValidationError::SendInProgress.into()));
        };

        let status = self.cooldown();
        if !status.allowed {
            return Err(rejected(
                ValidationError::CooldownActive {
                    remaining_ms: status.remaining_ms,
                }
                .into(),
            ));
        }

        let identity = self.identity.current();
        let outgoing = NewMessage {
            text: self.filter.apply(&text),
            username: self.filter.apply(&identity.username),
            user_id: identity.user_id,
        };

        let store = self.store.clone();
        let cooldown = self.cooldown.clone();
        let clock = self.clock.clone();

        let task = tokio::spawn(async move {
            let result = store.send(outgoing).await;
            if result.is_ok() {
                let now = clock.now();
                cooldown.lock().unwrap_or_else(|e| e.into_inner()).record(now);
            }
            drop(in_flight);
            result
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(ChatError::StoreUnavailable(format!("Send task failed: {e}"))),
        };

        match &result {
            Ok(receipt) => info!(msg_id = %receipt.id, "Message sent"),
            Err(e) => warn!(error = %e, "Message send failed"),
        }
        result
    }

    /// Soft-delete one of the local identity's own messages.
    pub async fn delete(&self, message: &ChatMessage) -> Result<(), ChatError> {
        let identity = self.identity.current();
        if !identity.owns(&message.user_id) {
            warn!(msg_id = %message.id, "Refusing to delete another user's message");
            return Err(ChatError::PermissionDenied(
                "Only the author can delete this message".to_string(),
            ));
        }

        match self.store.soft_delete(message.id, identity.user_id).await {
            Ok(()) => {
                info!(msg_id = %message.id, "Message deleted");
                Ok(())
            }
            Err(e) => {
                warn!(msg_id = %message.id, error = %e, "Message delete failed");
                Err(e)
            }
        }
    }

    /// Change the display name used for future messages.
    pub fn rename(&self, name: &str) -> Result<String, ChatError> {
        self.identity
            .set_username(name, &self.filter)
            .map_err(|e| {
                warn!(error = %e, "Rename rejected");
                e
            })
    }

    /// Project a snapshot for display in the viewer's time zone.
    pub fn project<Tz>(&self, snapshot: &[ChatMessage], now: &DateTime<Tz>) -> ChatView
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let window = self.lock_cooldown().window();
        view::project_with(
            window,
            snapshot,
            &self.identity.current(),
            self.last_send_at(),
            now,
        )
    }

    fn lock_cooldown(&self) -> std::sync::MutexGuard<'_, SendCooldown> {
        self.cooldown.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds the session's single send slot; releases it when dropped, including
/// when the send task unwinds.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn rejected(err: ChatError) -> ChatError {
    debug!(error = %err, "Send rejected locally");
    err
}
