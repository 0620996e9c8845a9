//! v002 -- Last accepted send per identity, for cooldown enforcement.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS send_log (
    user_id      TEXT PRIMARY KEY NOT NULL,
    last_send_at INTEGER NOT NULL             -- epoch ms
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
