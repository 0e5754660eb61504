//! Domain model structs passed between the connection layer, the router,
//! and the stores.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer over IPC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConversationId, MessageId, UserId};

// ---------------------------------------------------------------------------
// Change-feed record
// ---------------------------------------------------------------------------

/// A raw message row as delivered by the backend change feed.
///
/// `message` is the ciphertext envelope; it is decrypted by the router
/// before the message reaches a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    /// Server-assigned message identifier (authoritative).
    pub id: MessageId,
    /// The conversation the message belongs to.
    #[serde(alias = "topic_id")]
    pub conversation_id: ConversationId,
    /// Author of the message.
    pub user_id: UserId,
    /// Encrypted message body.
    pub message: String,
    /// Creation timestamp as reported by the backend.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// Resolved author metadata attached to every displayed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorProfile {
    pub id: UserId,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Chat message
// ---------------------------------------------------------------------------

/// A decrypted, author-resolved message held in a conversation's list.
///
/// The body is plaintext and lives in memory only; the persisted form is
/// always the ciphertext envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server-assigned identifier, unique within the conversation.
    pub id: MessageId,
    /// The conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Resolved author metadata.
    pub author: AuthorProfile,
    /// Decrypted message body.
    pub body: String,
    /// When the message was created (server clock).
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Whether a conversation is a topic chat or a private 1:1 thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConversationKind {
    Topic,
    Private { peer: UserId },
}

/// A conversation the user participates in, as reported by discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationInfo {
    pub id: ConversationId,
    pub kind: ConversationKind,
    /// Last activity timestamp, used to rank subscription priority.
    pub last_activity: DateTime<Utc>,
}
