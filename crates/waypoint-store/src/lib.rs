//! # waypoint-store
//!
//! Local durable storage for the Waypoint chat subsystem, backed by SQLite.
//!
//! Only read-state bookkeeping lives here: the per-conversation last-read
//! timestamp and unread count, so they survive process restarts.  Message
//! content is never persisted locally; the backend is the source of truth
//! for messages.

pub mod database;
pub mod migrations;
pub mod read_state;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use read_state::ReadState;
