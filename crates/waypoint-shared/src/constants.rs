use std::time::Duration;

/// Application name
pub const APP_NAME: &str = "Waypoint";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Maximum message body length in characters
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Envelope tag for the current (v2, AEAD) ciphertext format
pub const CIPHER_V2_TAG: &str = "wp2:";

/// Envelope tag for the deprecated (v1, XOR keystream) ciphertext format
pub const CIPHER_V1_TAG: &str = "wp1:";

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_MESSAGE_KEY_V2: &str = "waypoint-message-key-v2";
pub const KDF_CONTEXT_MESSAGE_KEY_V1: &str = "waypoint-message-key-v1";

/// Maximum number of simultaneously open realtime subscriptions
pub const MAX_SUBSCRIPTIONS: usize = 5;

/// Priority assigned to the conversation currently open in the UI
pub const PRIORITY_CURRENT: u32 = u32::MAX;

/// Priority a conversation is demoted to once it stops being the current
/// one: still ahead of the initial recency ranks, but evictable by the
/// next promotion
pub const PRIORITY_RECENT: u32 = u32::MAX - 1;

/// Reconnect backoff base delay
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(3000);

/// Reconnect backoff cap
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_millis(15_000);

/// Reconnect attempts before a subscription slot is dropped
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Grace delay before an evicted subscription is actually torn down
pub const EVICTION_GRACE: Duration = Duration::from_millis(500);

/// Typing indicators older than this are expired
pub const TYPING_EXPIRY: Duration = Duration::from_millis(5000);

/// Presence entries older than this are expired
pub const PRESENCE_EXPIRY: Duration = Duration::from_millis(30_000);

/// Repeated `mark_as_read` calls within this window are no-ops
pub const MARK_READ_DEBOUNCE: Duration = Duration::from_millis(1000);
