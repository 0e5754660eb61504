//! Typed inbound events, decoded once at the transport boundary.
//!
//! The backend SDK delivers dynamically-shaped JSON payloads.  Everything
//! downstream of this module works with [`RealtimeEvent`]; undecodable
//! payloads are logged and dropped here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use waypoint_shared::models::MessageRecord;
use waypoint_shared::types::{ConversationId, UserId};

// ---------------------------------------------------------------------------
// Transport-level events
// ---------------------------------------------------------------------------

/// Subscription channel status, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    Closed,
    ChannelError,
    TimedOut,
}

/// A raw event from one subscription, before decoding.
#[derive(Debug, Clone)]
pub struct RawFeedEvent {
    /// Event kind discriminator as the SDK names it.
    pub kind: String,
    /// Untyped payload.
    pub payload: Value,
}

/// Everything a transport can deliver to the connection manager.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Status(ConversationId, ChannelStatus),
    Feed(ConversationId, RawFeedEvent),
}

// ---------------------------------------------------------------------------
// Decoded events
// ---------------------------------------------------------------------------

/// A fully-decoded inbound event, ready for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// A new message row appeared on the change feed.
    MessageInserted(MessageRecord),
    /// A user started typing in a conversation.
    Typing {
        conversation: ConversationId,
        user: UserId,
        name: String,
    },
    /// A user stopped typing.
    StopTyping {
        conversation: ConversationId,
        user: UserId,
    },
    /// A user joined the conversation's presence set.
    PresenceJoin {
        conversation: ConversationId,
        user: UserId,
        name: String,
    },
    /// A user left the presence set.
    PresenceLeave {
        conversation: ConversationId,
        user: UserId,
    },
    /// Full presence snapshot for a conversation.
    PresenceSync {
        conversation: ConversationId,
        users: Vec<(UserId, String)>,
    },
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    user_id: UserId,
    #[serde(default)]
    user_name: String,
}

#[derive(Debug, Deserialize)]
struct SyncPayload {
    users: Vec<UserPayload>,
}

/// Decode a raw feed event.  Returns `None` (after logging) for unknown
/// kinds or malformed payloads; the feed is external input and must never
/// take the manager down.
pub fn decode_feed_event(conversation: ConversationId, raw: &RawFeedEvent) -> Option<RealtimeEvent> {
    let decoded = match raw.kind.as_str() {
        "insert" => serde_json::from_value::<MessageRecord>(raw.payload.clone())
            .map(RealtimeEvent::MessageInserted),
        "typing" => serde_json::from_value::<UserPayload>(raw.payload.clone()).map(|p| {
            RealtimeEvent::Typing {
                conversation,
                user: p.user_id,
                name: p.user_name,
            }
        }),
        "stop_typing" => serde_json::from_value::<UserPayload>(raw.payload.clone()).map(|p| {
            RealtimeEvent::StopTyping {
                conversation,
                user: p.user_id,
            }
        }),
        "presence_join" => serde_json::from_value::<UserPayload>(raw.payload.clone()).map(|p| {
            RealtimeEvent::PresenceJoin {
                conversation,
                user: p.user_id,
                name: p.user_name,
            }
        }),
        "presence_leave" => serde_json::from_value::<UserPayload>(raw.payload.clone()).map(|p| {
            RealtimeEvent::PresenceLeave {
                conversation,
                user: p.user_id,
            }
        }),
        "presence_sync" => serde_json::from_value::<SyncPayload>(raw.payload.clone()).map(|p| {
            RealtimeEvent::PresenceSync {
                conversation,
                users: p.users.into_iter().map(|u| (u.user_id, u.user_name)).collect(),
            }
        }),
        other => {
            warn!(kind = other, conversation = %conversation, "unknown feed event kind");
            return None;
        }
    };

    match decoded {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(kind = %raw.kind, conversation = %conversation, error = %e, "malformed feed payload");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound broadcasts
// ---------------------------------------------------------------------------

/// Low-latency ad-hoc events published on a conversation's channel.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum OutboundBroadcast {
    Typing {
        user: UserId,
        name: String,
        /// Sender-side timestamp, carried on the wire.  Receivers track
        /// their own arrival instant for expiry.
        at: DateTime<Utc>,
    },
    StopTyping { user: UserId },
    PresenceJoin { user: UserId, name: String },
    PresenceLeave { user: UserId },
}

impl OutboundBroadcast {
    /// Event kind discriminator, matching the inbound naming.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stop_typing",
            Self::PresenceJoin { .. } => "presence_join",
            Self::PresenceLeave { .. } => "presence_leave",
        }
    }

    /// Wire payload in the shape the SDK expects.
    pub fn payload(&self) -> Value {
        match self {
            Self::Typing { user, name, at } => {
                serde_json::json!({
                    "user_id": user,
                    "user_name": name,
                    "timestamp": at.to_rfc3339(),
                })
            }
            Self::PresenceJoin { user, name } => {
                serde_json::json!({ "user_id": user, "user_name": name })
            }
            Self::StopTyping { user } | Self::PresenceLeave { user } => {
                serde_json::json!({ "user_id": user })
            }
        }
    }
}
