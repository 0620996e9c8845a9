//! Projection of a message snapshot into what the chat widget renders.
//!
//! Pure functions only: the caller supplies the snapshot, the local
//! identity, the last accepted send and the current time in the viewer's
//! time zone.

use std::fmt::Display;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use haven_shared::constants::{AVATAR_PALETTE, UNREAD_BADGE_CEILING};
use haven_shared::cooldown::{CooldownStatus, CooldownWindow};
use haven_shared::protocol::visible_messages;
use haven_shared::{ChatMessage, LocalIdentity, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Avatar {
    pub color: &'static str,
    pub initial: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageItem {
    pub message: ChatMessage,
    /// Authored by the local identity
    pub is_own: bool,
    pub can_delete: bool,
    pub avatar: Avatar,
    /// Local `HH:MM`
    pub time_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup {
    pub day: NaiveDate,
    pub label: String,
    pub items: Vec<MessageItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub groups_by_day: Vec<DayGroup>,
    pub unread_badge_count: usize,
    pub cooldown: CooldownStatus,
}

impl ChatView {
    pub fn is_empty(&self) -> bool {
        self.groups_by_day.is_empty()
    }

    pub fn message_count(&self) -> usize {
        self.groups_by_day.iter().map(|g| g.items.len()).sum()
    }
}

/// Project with the default 30 s cooldown window.
pub fn project<Tz>(
    messages: &[ChatMessage],
    identity: &LocalIdentity,
    last_send_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> ChatView
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    project_with(CooldownWindow::default(), messages, identity, last_send_at, now)
}

pub fn project_with<Tz>(
    window: CooldownWindow,
    messages: &[ChatMessage],
    identity: &LocalIdentity,
    last_send_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> ChatView
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let visible = visible_messages(messages);
    let unread_badge_count = visible.len().min(UNREAD_BADGE_CEILING);
    let tz = now.timezone();
    let today = now.date_naive();

    let mut groups_by_day: Vec<DayGroup> = Vec::new();
    for message in visible {
        let local = message.timestamp.with_timezone(&tz);
        let day = local.date_naive();
        let is_own = identity.owns(&message.user_id);

        let item = MessageItem {
            is_own,
            can_delete: is_own,
            avatar: avatar_for(&message.user_id, &message.username),
            time_label: local.format("%H:%M").to_string(),
            message,
        };

        match groups_by_day.last_mut() {
            Some(group) if group.day == day => group.items.push(item),
            _ => groups_by_day.push(DayGroup {
                day,
                label: day_label(day, today),
                items: vec![item],
            }),
        }
    }

    ChatView {
        groups_by_day,
        unread_badge_count,
        cooldown: window.check(last_send_at, now.with_timezone(&Utc)),
    }
}

/// `Today`, `Yesterday`, or e.g. `Monday, January 5, 2026`.
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%A, %B %-d, %Y").to_string()
    }
}

pub fn avatar_color(user_id: &UserId) -> &'static str {
    let index = user_id.char_code_sum() % AVATAR_PALETTE.len() as u64;
    AVATAR_PALETTE[index as usize]
}

pub fn avatar_for(user_id: &UserId, username: &str) -> Avatar {
    let initial = username
        .chars()
        .find(|c| !c.is_whitespace())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('?');

    Avatar {
        color: avatar_color(user_id),
        initial,
    }
}
