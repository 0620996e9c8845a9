//! The append-only chat message log.
//!
//! Rows are never removed. A soft delete flips `is_deleted` once and stamps
//! `deleted_at`; every other column is immutable after insert.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension};

use haven_shared::protocol::NewMessage;
use haven_shared::{ChatMessage, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::send_log::upsert_send_log;

const SELECT_COLUMNS: &str =
    "SELECT id, text, username, user_id, timestamp, is_deleted, deleted_at FROM messages";

/// Result of [`Database::soft_delete_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteOutcome {
    pub message: ChatMessage,
    /// `false` when the message was already deleted.
    pub changed: bool,
}

impl Database {
    /// Append a message stamped with `now`, or with the newest stored
    /// timestamp if the clock reads earlier, so timestamps never decrease.
    ///
    /// The sender's `send_log` entry is written in the same transaction:
    /// either both land or neither does.
    pub fn append_message(&self, new: &NewMessage, now: DateTime<Utc>) -> Result<ChatMessage> {
        let tx = self.conn().unchecked_transaction()?;

        let latest: Option<i64> =
            tx.query_row("SELECT MAX(timestamp) FROM messages", [], |row| row.get(0))?;
        let ts_ms = latest.map_or(now.timestamp_millis(), |l| l.max(now.timestamp_millis()));
        let timestamp =
            millis_to_datetime(ts_ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(4, ts_ms))?;

        let message = ChatMessage {
            id: MessageId::new(),
            text: new.text.clone(),
            username: new.username.clone(),
            user_id: new.user_id.clone(),
            timestamp,
            is_deleted: false,
            deleted_at: None,
        };

        tx.execute(
            "INSERT INTO messages (id, text, username, user_id, timestamp, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                message.id.to_string(),
                message.text,
                message.username,
                message.user_id.as_str(),
                ts_ms,
            ],
        )?;
        upsert_send_log(&tx, &message.user_id, message.timestamp)?;
        tx.commit()?;

        Ok(message)
    }

    /// Every record, deleted ones included, oldest first.
    pub fn list_messages(&self) -> Result<Vec<ChatMessage>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY timestamp ASC, id ASC"))?;

        let rows = stmt.query_map([], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, id: MessageId) -> Result<ChatMessage> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    /// Mark a message deleted on behalf of `requester`.
    ///
    /// Fails with [`StoreError::NotOwner`] unless `requester` created the
    /// message. Deleting an already-deleted message succeeds without
    /// touching `deleted_at`.
    pub fn soft_delete_message(
        &self,
        id: MessageId,
        requester: &UserId,
        now: DateTime<Utc>,
    ) -> Result<SoftDeleteOutcome> {
        let tx = self.conn().unchecked_transaction()?;

        let current = tx
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))?;

        if &current.user_id != requester {
            return Err(StoreError::NotOwner { message_id: id });
        }

        if current.is_deleted {
            return Ok(SoftDeleteOutcome {
                message: current,
                changed: false,
            });
        }

        tx.execute(
            "UPDATE messages SET is_deleted = 1, deleted_at = ?1
             WHERE id = ?2 AND is_deleted = 0",
            params![now.timestamp_millis(), id.to_string()],
        )?;
        tx.commit()?;

        Ok(SoftDeleteOutcome {
            message: ChatMessage {
                is_deleted: true,
                deleted_at: Some(now),
                ..current
            },
            changed: true,
        })
    }

    pub fn count_messages(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id_str: String = row.get(0)?;
    let text: String = row.get(1)?;
    let username: String = row.get(2)?;
    let user_id: String = row.get(3)?;
    let ts_ms: i64 = row.get(4)?;
    let is_deleted: bool = row.get(5)?;
    let deleted_ms: Option<i64> = row.get(6)?;

    let id = MessageId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let timestamp =
        millis_to_datetime(ts_ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(4, ts_ms))?;

    let deleted_at = match deleted_ms {
        Some(ms) => {
            Some(millis_to_datetime(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(6, ms))?)
        }
        None => None,
    };

    Ok(ChatMessage {
        id,
        text,
        username,
        user_id: UserId(user_id),
        timestamp,
        is_deleted,
        deleted_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_message(user: &str, text: &str) -> NewMessage {
        NewMessage {
            text: text.into(),
            username: "User4242".into(),
            user_id: UserId::new(user),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_760_000_000_000).unwrap()
    }

    #[test]
    fn test_append_and_list() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.append_message(&new_message("user_a", "hello"), t0()).unwrap();

        assert!(!stored.is_deleted);
        assert_eq!(stored.timestamp, t0());

        let all = db.list_messages().unwrap();
        assert_eq!(all, vec![stored.clone()]);
        assert_eq!(db.get_message(stored.id).unwrap(), stored);
    }

    #[test]
    fn test_append_records_send_time() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.append_message(&new_message("user_a", "hello"), t0()).unwrap();
        assert_eq!(db.last_send_at(&stored.user_id).unwrap(), Some(t0()));
    }

    #[test]
    fn test_append_rolls_back_when_send_log_fails() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_send_log BEFORE INSERT ON send_log
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        assert!(db.append_message(&new_message("user_a", "hello"), t0()).is_err());
        assert_eq!(db.count_messages().unwrap(), 0);
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let db = Database::open_in_memory().unwrap();
        let first = db.append_message(&new_message("user_a", "one"), t0()).unwrap();
        let second = db
            .append_message(&new_message("user_b", "two"), t0() - Duration::seconds(5))
            .unwrap();

        assert_eq!(second.timestamp, first.timestamp);

        let listed = db.list_messages().unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn test_soft_delete_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let owner = UserId::new("user_a");
        let stored = db.append_message(&new_message("user_a", "bye"), t0()).unwrap();

        let deleted_at = t0() + Duration::seconds(10);
        let first = db.soft_delete_message(stored.id, &owner, deleted_at).unwrap();
        assert!(first.changed);
        assert!(first.message.is_deleted);
        assert_eq!(first.message.deleted_at, Some(deleted_at));

        let second = db
            .soft_delete_message(stored.id, &owner, deleted_at + Duration::seconds(30))
            .unwrap();
        assert!(!second.changed);
        assert_eq!(second.message, first.message);
        assert_eq!(db.get_message(stored.id).unwrap(), first.message);
    }

    #[test]
    fn test_soft_delete_rejects_other_identity() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.append_message(&new_message("user_b", "mine"), t0()).unwrap();

        let err = db
            .soft_delete_message(stored.id, &UserId::new("user_a"), t0())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotOwner { .. }));
        assert_eq!(db.get_message(stored.id).unwrap(), stored);
    }

    #[test]
    fn test_missing_message() {
        let db = Database::open_in_memory().unwrap();
        let id = MessageId::new();
        assert!(matches!(db.get_message(id), Err(StoreError::NotFound(x)) if x == id));
        assert!(matches!(
            db.soft_delete_message(id, &UserId::new("user_a"), t0()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_records_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");

        let id = {
            let db = Database::open_at(&path).unwrap();
            let m = db.append_message(&new_message("user_a", "persist"), t0()).unwrap();
            db.soft_delete_message(m.id, &UserId::new("user_a"), t0()).unwrap();
            m.id
        };

        let db = Database::open_at(&path).unwrap();
        let m = db.get_message(id).unwrap();
        assert!(m.is_deleted);
        assert_eq!(db.count_messages().unwrap(), 1);
    }
}
