//! Optimistic message state for private 1:1 conversations.
//!
//! Locally authored messages appear immediately with a temporary local id
//! and a `Sending` delivery state.  When the echo of the message arrives on
//! the change feed it is reconciled against the oldest matching placeholder
//! instead of producing a second bubble.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use waypoint_shared::models::{AuthorProfile, ChatMessage};
use waypoint_shared::types::{ConversationId, DeliveryState, MessageId};

use std::collections::HashMap;

/// A private message, possibly not yet acknowledged by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMessage {
    /// Server-assigned id once the message is acknowledged.
    pub server_id: Option<MessageId>,
    /// Local identity, stable across reconciliation.
    pub local_id: Uuid,
    pub conversation_id: ConversationId,
    pub author: AuthorProfile,
    pub body: String,
    pub created_at: chrono::DateTime<Utc>,
    pub delivery: DeliveryState,
}

/// Outcome of feeding a change-feed message into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The message matched an in-flight placeholder, which adopted the
    /// server identity in place.
    Replaced(Uuid),
    /// The message was new (authored by a peer, or from another session)
    /// and was appended.
    Appended,
    /// The server id was already known; nothing changed.
    Duplicate,
}

/// Per-conversation lists of private messages.
#[derive(Default)]
pub struct PrivateChatStore {
    messages: HashMap<ConversationId, Vec<PrivateMessage>>,
}

impl PrivateChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an optimistic placeholder and return its local id.
    pub fn begin_send(
        &mut self,
        conversation: ConversationId,
        author: AuthorProfile,
        body: String,
    ) -> Uuid {
        let local_id = Uuid::new_v4();
        self.messages
            .entry(conversation)
            .or_default()
            .push(PrivateMessage {
                server_id: None,
                local_id,
                conversation_id: conversation,
                author,
                body,
                created_at: Utc::now(),
                delivery: DeliveryState::Sending,
            });
        local_id
    }

    /// Attach the server identity to a placeholder after the backend
    /// acknowledged the insert.
    pub fn mark_sent(
        &mut self,
        conversation: ConversationId,
        local_id: Uuid,
        server_id: MessageId,
        created_at: chrono::DateTime<Utc>,
    ) -> bool {
        let Some(msg) = self.find_local(conversation, local_id) else {
            return false;
        };
        msg.server_id = Some(server_id);
        msg.created_at = created_at;
        msg.delivery = DeliveryState::Sent;
        true
    }

    /// Flag a placeholder as failed so the UI can offer a retry.
    pub fn mark_failed(&mut self, conversation: ConversationId, local_id: Uuid) -> bool {
        let Some(msg) = self.find_local(conversation, local_id) else {
            return false;
        };
        msg.delivery = DeliveryState::Failed;
        true
    }

    /// Flip a failed message back to `Sending` and hand out its body for a
    /// fresh send attempt.  Returns `None` unless the message exists and is
    /// in the `Failed` state.
    pub fn take_for_retry(&mut self, conversation: ConversationId, local_id: Uuid) -> Option<String> {
        let msg = self.find_local(conversation, local_id)?;
        if msg.delivery != DeliveryState::Failed {
            return None;
        }
        msg.delivery = DeliveryState::Sending;
        Some(msg.body.clone())
    }

    /// Reconcile an inbound change-feed message.
    ///
    /// A placeholder matches when it has no server id yet, is not failed,
    /// and agrees on author and exact body.  The oldest match wins so two
    /// identical in-flight sends resolve in order.
    pub fn receive(&mut self, msg: ChatMessage) -> Reconciliation {
        let list = self.messages.entry(msg.conversation_id).or_default();

        if list.iter().any(|m| m.server_id == Some(msg.id)) {
            debug!(message = %msg.id, "duplicate private message ignored");
            return Reconciliation::Duplicate;
        }

        let placeholder = list.iter_mut().find(|m| {
            m.server_id.is_none()
                && m.delivery != DeliveryState::Failed
                && m.author.id == msg.author.id
                && m.body == msg.body
        });

        if let Some(existing) = placeholder {
            existing.server_id = Some(msg.id);
            existing.created_at = msg.created_at;
            existing.author = msg.author;
            existing.delivery = DeliveryState::Sent;
            return Reconciliation::Replaced(existing.local_id);
        }

        list.push(PrivateMessage {
            server_id: Some(msg.id),
            local_id: Uuid::new_v4(),
            conversation_id: msg.conversation_id,
            author: msg.author,
            body: msg.body,
            created_at: msg.created_at,
            delivery: DeliveryState::Sent,
        });
        Reconciliation::Appended
    }

    /// Messages of a conversation in insertion order.
    pub fn messages(&self, conversation: ConversationId) -> &[PrivateMessage] {
        self.messages
            .get(&conversation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn find_local(
        &mut self,
        conversation: ConversationId,
        local_id: Uuid,
    ) -> Option<&mut PrivateMessage> {
        self.messages
            .get_mut(&conversation)?
            .iter_mut()
            .find(|m| m.local_id == local_id)
    }
}
