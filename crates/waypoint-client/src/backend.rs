//! The seam between the chat engine and the managed backend.
//!
//! Persistence, discovery, and author lookup are consumed, not owned: a
//! production implementation wraps the vendor database client, tests inject
//! fakes.  Every method returns a `Send` future so the router loop can run
//! in a spawned task.

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::debug;

use waypoint_shared::models::{AuthorProfile, ConversationInfo, MessageRecord};
use waypoint_shared::types::{ConversationId, MessageId, UserId};

use crate::error::BackendError;

/// A message as handed to the backend for insertion.  The body is already
/// the ciphertext envelope; plaintext never crosses this seam.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// External persistence and lookup operations.
pub trait ChatBackend: Send + Sync + 'static {
    /// Persist a message; the returned record carries the server-assigned id.
    fn insert_message(
        &self,
        draft: MessageDraft,
    ) -> impl Future<Output = Result<MessageRecord, BackendError>> + Send;

    /// Fetch the most recent messages of a conversation.
    fn fetch_messages(
        &self,
        conversation: ConversationId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, BackendError>> + Send;

    /// Count messages newer than `since` in a conversation.
    fn fetch_unread_count_since(
        &self,
        conversation: ConversationId,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<u32, BackendError>> + Send;

    /// Replace the persisted ciphertext of a message (cipher upgrades).
    fn rewrite_message_body(
        &self,
        id: MessageId,
        body: String,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Conversations the user participates in.
    fn list_conversations(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<ConversationInfo>, BackendError>> + Send;

    /// Resolve display metadata for a user.
    fn lookup_author(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<AuthorProfile, BackendError>> + Send;
}

/// New-message side effect (sound, badge).  Best-effort: the router logs
/// and swallows failures.
pub trait Notifier: Send + Sync + 'static {
    fn message_received(&self, conversation: ConversationId) -> Result<(), String>;
}

/// Notifier that does nothing.  Useful headless and in tests.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn message_received(&self, conversation: ConversationId) -> Result<(), String> {
        debug!(conversation = %conversation, "notification suppressed (noop notifier)");
        Ok(())
    }
}
