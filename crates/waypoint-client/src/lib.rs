//! # waypoint-client
//!
//! The client-side chat engine: the observable chat state store, the message
//! router that turns change-feed events into store mutations, the optimistic
//! private chat store, and the [`ChatClient`] orchestrator that wires them
//! to the connection manager.

pub mod backend;
pub mod client;
pub mod events;
pub mod private;
pub mod router;
pub mod store;

mod error;

use tracing_subscriber::{fmt, EnvFilter};

pub use backend::{ChatBackend, MessageDraft, NoopNotifier, Notifier};
pub use client::ChatClient;
pub use error::{BackendError, ClientError};
pub use events::ClientEvent;
pub use private::{PrivateChatStore, PrivateMessage, Reconciliation};
pub use router::MessageRouter;
pub use store::ChatStore;

/// Install the default tracing subscriber.  Call once at process start.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("waypoint_client=debug,waypoint_net=debug,waypoint_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
