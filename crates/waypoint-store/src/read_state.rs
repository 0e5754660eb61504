//! CRUD operations for per-conversation read bookkeeping.
//!
//! The chat store treats this as best-effort persistence: the in-memory
//! counter is authoritative while the process lives, and these rows are the
//! fallback on the next cold start.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use waypoint_shared::types::ConversationId;

use crate::database::Database;
use crate::error::Result;

/// Persisted read bookkeeping for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadState {
    pub conversation_id: ConversationId,
    pub last_read_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
}

impl Database {
    /// Insert or replace the read state for a conversation.
    pub fn upsert_read_state(&self, state: &ReadState) -> Result<()> {
        self.conn().execute(
            "INSERT INTO read_state (conversation_id, last_read_at, unread_count)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 last_read_at = excluded.last_read_at,
                 unread_count = excluded.unread_count",
            params![
                state.conversation_id.to_string(),
                state.last_read_at.map(|t| t.to_rfc3339()),
                state.unread_count,
            ],
        )?;
        Ok(())
    }

    /// Fetch the read state for a conversation, if one was ever persisted.
    pub fn get_read_state(&self, conversation_id: ConversationId) -> Result<Option<ReadState>> {
        let row = self
            .conn()
            .query_row(
                "SELECT conversation_id, last_read_at, unread_count
                 FROM read_state
                 WHERE conversation_id = ?1",
                params![conversation_id.to_string()],
                row_to_read_state,
            )
            .optional()?;
        Ok(row)
    }

    /// Increment the persisted unread counter by one, creating the row if
    /// it does not exist.  Returns the new count.
    pub fn bump_unread(&self, conversation_id: ConversationId) -> Result<u32> {
        self.conn().execute(
            "INSERT INTO read_state (conversation_id, last_read_at, unread_count)
             VALUES (?1, NULL, 1)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 unread_count = unread_count + 1",
            params![conversation_id.to_string()],
        )?;
        let count = self.conn().query_row(
            "SELECT unread_count FROM read_state WHERE conversation_id = ?1",
            params![conversation_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Zero the unread counter and record the read timestamp.
    pub fn clear_unread(
        &self,
        conversation_id: ConversationId,
        read_at: DateTime<Utc>,
    ) -> Result<()> {
        self.upsert_read_state(&ReadState {
            conversation_id,
            last_read_at: Some(read_at),
            unread_count: 0,
        })
    }
}

fn row_to_read_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadState> {
    let id_str: String = row.get(0)?;
    let last_read_str: Option<String> = row.get(1)?;
    let unread_count: u32 = row.get(2)?;

    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let last_read_at = last_read_str
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()?;

    Ok(ReadState {
        conversation_id: ConversationId(id),
        last_read_at,
        unread_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get_round_trip() {
        let db = db();
        let conv = ConversationId::new();
        let read_at = Utc::now();

        let state = ReadState {
            conversation_id: conv,
            last_read_at: Some(read_at),
            unread_count: 4,
        };
        db.upsert_read_state(&state).unwrap();

        let loaded = db.get_read_state(conv).unwrap().unwrap();
        assert_eq!(loaded.unread_count, 4);
        assert_eq!(
            loaded.last_read_at.unwrap().timestamp_millis(),
            read_at.timestamp_millis()
        );
    }

    #[test]
    fn test_missing_conversation_is_none() {
        let db = db();
        assert!(db.get_read_state(ConversationId::new()).unwrap().is_none());
    }

    #[test]
    fn test_bump_creates_then_increments() {
        let db = db();
        let conv = ConversationId::new();

        assert_eq!(db.bump_unread(conv).unwrap(), 1);
        assert_eq!(db.bump_unread(conv).unwrap(), 2);
        assert_eq!(db.bump_unread(conv).unwrap(), 3);
    }

    #[test]
    fn test_clear_unread_zeroes_and_stamps() {
        let db = db();
        let conv = ConversationId::new();
        db.bump_unread(conv).unwrap();
        db.bump_unread(conv).unwrap();

        let read_at = Utc::now();
        db.clear_unread(conv, read_at).unwrap();

        let loaded = db.get_read_state(conv).unwrap().unwrap();
        assert_eq!(loaded.unread_count, 0);
        assert!(loaded.last_read_at.is_some());
    }
}
