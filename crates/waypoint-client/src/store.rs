//! In-memory chat state: per-conversation message lists, typing and
//! presence maps, unread counters, and message search.
//!
//! The store is synchronous and lock-friendly.  All async work (decryption,
//! author lookup, backend calls) happens in the router and client before a
//! mutation reaches this layer, so a `std::sync::Mutex` around the store is
//! never held across an await point.
//!
//! Time-based state (typing, presence, read debounce) is bookkept with
//! [`tokio::time::Instant`] so tests can drive expiry with the paused
//! runtime clock.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

use waypoint_shared::constants::{MARK_READ_DEBOUNCE, PRESENCE_EXPIRY, TYPING_EXPIRY};
use waypoint_shared::models::ChatMessage;
use waypoint_shared::types::{ConversationId, MessageId, UserId};
use waypoint_store::{Database, ReadState};

/// A typing or presence signal with the instant it was last refreshed.
#[derive(Debug, Clone)]
struct EphemeralEntry {
    display_name: String,
    seen_at: Instant,
}

/// Unread bookkeeping for one conversation.
#[derive(Debug, Clone, Default)]
struct UnreadCounter {
    count: u32,
    last_read_at: Option<DateTime<Utc>>,
    /// Debounce anchor for `mark_as_read`.
    last_marked: Option<Instant>,
}

/// The observable chat state for topic conversations.
pub struct ChatStore {
    messages: HashMap<ConversationId, Vec<ChatMessage>>,
    known_ids: HashMap<ConversationId, HashSet<MessageId>>,
    typing: HashMap<ConversationId, HashMap<UserId, EphemeralEntry>>,
    presence: HashMap<ConversationId, HashMap<UserId, EphemeralEntry>>,
    unread: HashMap<ConversationId, UnreadCounter>,
    current: Option<ConversationId>,
    search_results: Vec<ChatMessage>,
    /// Best-effort durable read state.  `None` runs fully in memory.
    durable: Option<Database>,
}

impl ChatStore {
    pub fn new(durable: Option<Database>) -> Self {
        Self {
            messages: HashMap::new(),
            known_ids: HashMap::new(),
            typing: HashMap::new(),
            presence: HashMap::new(),
            unread: HashMap::new(),
            current: None,
            search_results: Vec::new(),
            durable,
        }
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Insert a message into its conversation, keeping the list sorted by
    /// `(created_at, id)`.  Returns `false` if the id was already known;
    /// re-delivered feed events are dropped here.
    pub fn insert_message(&mut self, msg: ChatMessage) -> bool {
        let known = self.known_ids.entry(msg.conversation_id).or_default();
        if !known.insert(msg.id) {
            debug!(message = %msg.id, "duplicate message ignored");
            return false;
        }

        let list = self.messages.entry(msg.conversation_id).or_default();
        let at = list.partition_point(|m| (m.created_at, m.id) <= (msg.created_at, msg.id));
        list.insert(at, msg);
        true
    }

    /// Messages of a conversation, oldest first.
    pub fn messages(&self, conversation: ConversationId) -> &[ChatMessage] {
        self.messages
            .get(&conversation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_message(&self, conversation: ConversationId, id: MessageId) -> bool {
        self.known_ids
            .get(&conversation)
            .is_some_and(|known| known.contains(&id))
    }

    // -----------------------------------------------------------------------
    // Current conversation
    // -----------------------------------------------------------------------

    pub fn set_current(&mut self, conversation: Option<ConversationId>) {
        self.current = conversation;
    }

    pub fn current(&self) -> Option<ConversationId> {
        self.current
    }

    // -----------------------------------------------------------------------
    // Typing indicators
    // -----------------------------------------------------------------------

    pub fn typing_started(&mut self, conversation: ConversationId, user: UserId, name: String) {
        self.typing.entry(conversation).or_default().insert(
            user,
            EphemeralEntry {
                display_name: name,
                seen_at: Instant::now(),
            },
        );
    }

    pub fn typing_stopped(&mut self, conversation: ConversationId, user: UserId) {
        if let Some(map) = self.typing.get_mut(&conversation) {
            map.remove(&user);
        }
    }

    /// Users currently typing in a conversation.  Entries older than the
    /// typing expiry are garbage-collected on read, so a peer whose
    /// stop-typing broadcast was lost disappears on its own.
    pub fn typing_users(&mut self, conversation: ConversationId) -> Vec<(UserId, String)> {
        collect_live(self.typing.get_mut(&conversation), TYPING_EXPIRY)
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    pub fn presence_join(&mut self, conversation: ConversationId, user: UserId, name: String) {
        self.presence.entry(conversation).or_default().insert(
            user,
            EphemeralEntry {
                display_name: name,
                seen_at: Instant::now(),
            },
        );
    }

    pub fn presence_leave(&mut self, conversation: ConversationId, user: UserId) {
        if let Some(map) = self.presence.get_mut(&conversation) {
            map.remove(&user);
        }
    }

    /// Replace the presence roster of a conversation wholesale.
    pub fn presence_sync(&mut self, conversation: ConversationId, users: Vec<(UserId, String)>) {
        let now = Instant::now();
        let map = users
            .into_iter()
            .map(|(user, display_name)| {
                (
                    user,
                    EphemeralEntry {
                        display_name,
                        seen_at: now,
                    },
                )
            })
            .collect();
        self.presence.insert(conversation, map);
    }

    /// Users considered online in a conversation.  Entries not refreshed
    /// within the presence expiry window are dropped on read.
    pub fn online_users(&mut self, conversation: ConversationId) -> Vec<(UserId, String)> {
        collect_live(self.presence.get_mut(&conversation), PRESENCE_EXPIRY)
    }

    // -----------------------------------------------------------------------
    // Unread counters
    // -----------------------------------------------------------------------

    /// Record an inbound message for unread accounting.  Returns the new
    /// count, or `None` when the conversation is currently open and the
    /// counter must not move.
    pub fn note_inbound(&mut self, conversation: ConversationId) -> Option<u32> {
        if self.current == Some(conversation) {
            return None;
        }
        let counter = self.unread.entry(conversation).or_default();
        counter.count = counter.count.saturating_add(1);
        let count = counter.count;

        if let Some(db) = &self.durable {
            if let Err(e) = db.bump_unread(conversation) {
                warn!(conversation = %conversation, error = %e, "unread persist failed");
            }
        }
        Some(count)
    }

    /// Clear the unread counter and stamp the read time.  Calls repeated
    /// within the debounce window return `false` and change nothing.
    pub fn mark_as_read(&mut self, conversation: ConversationId) -> bool {
        let now = Instant::now();
        let counter = self.unread.entry(conversation).or_default();

        if let Some(last) = counter.last_marked {
            if now.duration_since(last) < MARK_READ_DEBOUNCE {
                return false;
            }
        }
        counter.last_marked = Some(now);
        counter.count = 0;
        let read_at = Utc::now();
        counter.last_read_at = Some(read_at);

        if let Some(db) = &self.durable {
            if let Err(e) = db.clear_unread(conversation, read_at) {
                warn!(conversation = %conversation, error = %e, "read state persist failed");
            }
        }
        true
    }

    pub fn unread_count(&self, conversation: ConversationId) -> u32 {
        self.unread
            .get(&conversation)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn last_read_at(&self, conversation: ConversationId) -> Option<DateTime<Utc>> {
        self.unread.get(&conversation).and_then(|c| c.last_read_at)
    }

    /// Overwrite the unread counter, used when hydrating from the backend
    /// on startup.
    pub fn set_unread(&mut self, conversation: ConversationId, count: u32) {
        let counter = self.unread.entry(conversation).or_default();
        counter.count = count;
    }

    /// Load persisted read state for a conversation, if the store has a
    /// durable layer and a row exists.
    pub fn persisted_read_state(&self, conversation: ConversationId) -> Option<ReadState> {
        let db = self.durable.as_ref()?;
        match db.get_read_state(conversation) {
            Ok(state) => state,
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "read state load failed");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Case-insensitive substring search over a conversation's message
    /// bodies and author names.  An empty query clears the result set.
    pub fn search(&mut self, conversation: ConversationId, query: &str) -> &[ChatMessage] {
        if query.is_empty() {
            self.search_results.clear();
            return &self.search_results;
        }
        let needle = query.to_lowercase();
        self.search_results = self
            .messages
            .get(&conversation)
            .map(|list| {
                list.iter()
                    .filter(|m| {
                        m.body.to_lowercase().contains(&needle)
                            || m.author.display_name.to_lowercase().contains(&needle)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        &self.search_results
    }

    pub fn search_results(&self) -> &[ChatMessage] {
        &self.search_results
    }
}

/// Drop entries older than `expiry` and return the survivors.
fn collect_live(
    map: Option<&mut HashMap<UserId, EphemeralEntry>>,
    expiry: std::time::Duration,
) -> Vec<(UserId, String)> {
    let Some(map) = map else {
        return Vec::new();
    };
    let now = Instant::now();
    map.retain(|_, entry| now.duration_since(entry.seen_at) < expiry);
    map.iter()
        .map(|(user, entry)| (*user, entry.display_name.clone()))
        .collect()
}
