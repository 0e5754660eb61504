//! # waypoint-shared
//!
//! Types, constants, and helpers shared across the Waypoint realtime chat
//! subsystem: strongly-typed identifiers, the message body encryption codec,
//! and the generic retry-with-backoff wrapper used around every backend call.

pub mod codec;
pub mod constants;
pub mod models;
pub mod retry;
pub mod types;

mod error;

pub use codec::{CipherVersion, MessageCodec};
pub use error::CryptoError;
pub use retry::{backoff_delay, retry, RetryPolicy, Transient};
pub use types::{ConversationId, MessageId, UserId};
