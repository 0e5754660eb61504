//! The seam between the connection manager and the backend realtime SDK.
//!
//! A production transport wraps the vendor client; tests inject a fake that
//! records calls and replays scripted events.  The trait is synchronous on
//! purpose: real SDK clients complete subscribe/publish internally and
//! report outcomes through the event channel handed to [`RealtimeTransport::open`].

use tokio::sync::mpsc;

use waypoint_shared::types::ConversationId;
use waypoint_shared::Transient;

use crate::events::{OutboundBroadcast, TransportEvent};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Subscribe failed for {conversation}: {reason}")]
    Subscribe {
        conversation: ConversationId,
        reason: String,
    },

    #[error("Publish failed for {conversation}: {reason}")]
    Publish {
        conversation: ConversationId,
        reason: String,
    },

    #[error("Probe failed for {conversation}")]
    Probe { conversation: ConversationId },

    #[error("Transport is shut down")]
    Closed,
}

impl Transient for TransportError {
    fn is_transient(&self) -> bool {
        // Every transport failure is a connectivity problem worth retrying;
        // authorization failures surface through the backend trait instead.
        !matches!(self, TransportError::Closed)
    }
}

/// One realtime connection provider.
///
/// `open` registers a change-feed + broadcast subscription for a single
/// conversation and delivers [`TransportEvent`]s on `events` until `close`
/// is called for that conversation.
pub trait RealtimeTransport: Send + 'static {
    fn open(
        &mut self,
        conversation: ConversationId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError>;

    fn close(&mut self, conversation: ConversationId);

    fn broadcast(
        &mut self,
        conversation: ConversationId,
        payload: &OutboundBroadcast,
    ) -> Result<(), TransportError>;

    /// Lightweight liveness probe on an open subscription.
    fn probe(&mut self, conversation: ConversationId) -> Result<(), TransportError>;
}
