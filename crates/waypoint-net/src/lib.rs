// Realtime connection layer: bounded subscription pool over a pluggable
// change-feed transport, with priority eviction and backoff reconnection.

pub mod events;
pub mod manager;
pub mod slots;
pub mod transport;

pub use events::{ChannelStatus, OutboundBroadcast, RawFeedEvent, RealtimeEvent, TransportEvent};
pub use manager::{spawn_connection_manager, ManagerCommand, ManagerConfig};
pub use slots::{Activation, ReconnectDecision, SlotPool, SlotState};
pub use transport::{RealtimeTransport, TransportError};
