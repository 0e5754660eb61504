//! v001 -- Initial schema creation.
//!
//! Creates the `read_state` table holding per-conversation read bookkeeping.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS read_state (
    conversation_id TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    last_read_at    TEXT,                       -- ISO-8601 / RFC-3339, nullable
    unread_count    INTEGER NOT NULL DEFAULT 0
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
