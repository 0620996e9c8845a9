//! Last accepted send per identity.
//!
//! Backs the store-side cooldown so the window survives restarts and cannot
//! be reset by clearing client storage.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use haven_shared::UserId;

use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn last_send_at(&self, user_id: &UserId) -> Result<Option<DateTime<Utc>>> {
        let ms: Option<i64> = self
            .conn()
            .query_row(
                "SELECT last_send_at FROM send_log WHERE user_id = ?1",
                params![user_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    pub fn record_send(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<()> {
        upsert_send_log(self.conn(), user_id, at)
    }

    /// Drop entries older than `cutoff`. Returns the number removed.
    pub fn purge_send_log(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM send_log WHERE last_send_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(removed)
    }
}

/// Shared by [`Database::record_send`] and the append transaction.
pub(crate) fn upsert_send_log(
    conn: &Connection,
    user_id: &UserId,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO send_log (user_id, last_send_at) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET last_send_at = excluded.last_send_at",
        params![user_id.as_str(), at.timestamp_millis()],
    )?;
    Ok(())
}
