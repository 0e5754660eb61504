//! Events the chat engine publishes to its UI observers.

use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use waypoint_shared::types::{ConversationId, MessageId};

/// State-change notifications for subscribers (UI layers, tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A message authored locally was accepted by the backend.
    MessageSent {
        conversation: ConversationId,
        id: MessageId,
    },
    /// A remote message was routed into the store.
    MessageReceived {
        conversation: ConversationId,
        id: MessageId,
    },
    /// The unread counter of a conversation changed.
    UnreadChanged {
        conversation: ConversationId,
        count: u32,
    },
    /// A private message changed delivery state or was reconciled.
    PrivateMessageUpdated {
        conversation: ConversationId,
        local_id: Uuid,
    },
}

/// Publish an event, tolerating the no-subscribers case.
pub(crate) fn emit_event(tx: &broadcast::Sender<ClientEvent>, event: ClientEvent) {
    if tx.send(event).is_err() {
        trace!("client event dropped, no subscribers");
    }
}
