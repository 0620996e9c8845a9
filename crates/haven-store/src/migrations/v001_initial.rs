//! v001 -- Initial schema creation.
//!
//! Creates the chat message log and the client key-value storage table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Chat messages (append-only, soft-deleted)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY NOT NULL,   -- UUID v7
    text        TEXT NOT NULL,
    username    TEXT NOT NULL,               -- captured at send time
    user_id     TEXT NOT NULL,               -- owning identity
    timestamp   INTEGER NOT NULL,            -- epoch ms, store assigned
    is_deleted  INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    deleted_at  INTEGER                      -- epoch ms
);

CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages(timestamp, id);

-- ----------------------------------------------------------------
-- Client key-value storage (chatUserId, chatUsername, user_token)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS client_storage (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
