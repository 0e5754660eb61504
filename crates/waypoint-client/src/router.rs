//! Routes decoded realtime events into the stores.
//!
//! The router owns the read path of a message: dedup, author resolution,
//! decryption, lazy cipher upgrade, and unread accounting.  Store locks are
//! taken in tight scopes and never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use waypoint_net::events::RealtimeEvent;
use waypoint_shared::models::{AuthorProfile, ChatMessage, ConversationKind, MessageRecord};
use waypoint_shared::types::ConversationId;
use waypoint_shared::{retry, CipherVersion, MessageCodec, RetryPolicy};

use crate::backend::{ChatBackend, Notifier};
use crate::events::{emit_event, ClientEvent};
use crate::private::{PrivateChatStore, Reconciliation};
use crate::store::ChatStore;

/// Turns [`RealtimeEvent`]s into store mutations and client events.
pub struct MessageRouter<B, N> {
    backend: Arc<B>,
    codec: Arc<MessageCodec>,
    notifier: Arc<N>,
    store: Arc<Mutex<ChatStore>>,
    private: Arc<Mutex<PrivateChatStore>>,
    kinds: Arc<Mutex<HashMap<ConversationId, ConversationKind>>>,
    events_tx: broadcast::Sender<ClientEvent>,
    retry_policy: RetryPolicy,
}

impl<B: ChatBackend, N: Notifier> MessageRouter<B, N> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<B>,
        codec: Arc<MessageCodec>,
        notifier: Arc<N>,
        store: Arc<Mutex<ChatStore>>,
        private: Arc<Mutex<PrivateChatStore>>,
        kinds: Arc<Mutex<HashMap<ConversationId, ConversationKind>>>,
        events_tx: broadcast::Sender<ClientEvent>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            codec,
            notifier,
            store,
            private,
            kinds,
            events_tx,
            retry_policy,
        }
    }

    /// Dispatch one decoded event.
    pub async fn route(&self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::MessageInserted(record) => self.route_message(record).await,
            RealtimeEvent::Typing {
                conversation,
                user,
                name,
            } => {
                if let Ok(mut store) = self.store.lock() {
                    store.typing_started(conversation, user, name);
                }
            }
            RealtimeEvent::StopTyping { conversation, user } => {
                if let Ok(mut store) = self.store.lock() {
                    store.typing_stopped(conversation, user);
                }
            }
            RealtimeEvent::PresenceJoin {
                conversation,
                user,
                name,
            } => {
                if let Ok(mut store) = self.store.lock() {
                    store.presence_join(conversation, user, name);
                }
            }
            RealtimeEvent::PresenceLeave { conversation, user } => {
                if let Ok(mut store) = self.store.lock() {
                    store.presence_leave(conversation, user);
                }
            }
            RealtimeEvent::PresenceSync {
                conversation,
                users,
            } => {
                if let Ok(mut store) = self.store.lock() {
                    store.presence_sync(conversation, users);
                }
            }
        }
    }

    /// Route one inbound message record: dedup, resolve the author, decrypt,
    /// insert, and account for unread state.
    async fn route_message(&self, record: MessageRecord) {
        let conversation = record.conversation_id;

        // Cheap dedup before any backend round trip.  The stores dedup
        // again on insert, this just avoids the author lookup.
        {
            let Ok(store) = self.store.lock() else {
                warn!("chat store lock poisoned, dropping message");
                return;
            };
            if store.contains_message(conversation, record.id) {
                debug!(message = %record.id, "feed re-delivered known message");
                return;
            }
        }

        let author = match self.resolve_author(&record).await {
            Some(author) => author,
            None => return,
        };

        let body = self.codec.decrypt(&record.message);
        if MessageCodec::version_of(&record.message) == Some(CipherVersion::V1) {
            self.spawn_upgrade(&record);
        }

        let message = ChatMessage {
            id: record.id,
            conversation_id: conversation,
            author,
            body,
            created_at: record.created_at,
        };

        let kind = self
            .kinds
            .lock()
            .ok()
            .and_then(|kinds| kinds.get(&conversation).cloned())
            .unwrap_or(ConversationKind::Topic);

        match kind {
            ConversationKind::Topic => self.deliver_topic(message),
            ConversationKind::Private { .. } => self.deliver_private(message),
        }
    }

    fn deliver_topic(&self, message: ChatMessage) {
        let conversation = message.conversation_id;
        let id = message.id;

        let unread = {
            let Ok(mut store) = self.store.lock() else {
                warn!("chat store lock poisoned, dropping message");
                return;
            };
            if !store.insert_message(message) {
                return;
            }
            store.note_inbound(conversation)
        };

        emit_event(
            &self.events_tx,
            ClientEvent::MessageReceived { conversation, id },
        );
        if let Some(count) = unread {
            emit_event(
                &self.events_tx,
                ClientEvent::UnreadChanged {
                    conversation,
                    count,
                },
            );
            if let Err(e) = self.notifier.message_received(conversation) {
                warn!(conversation = %conversation, error = %e, "notifier failed");
            }
        }
    }

    fn deliver_private(&self, message: ChatMessage) {
        let conversation = message.conversation_id;
        let id = message.id;

        let outcome = {
            let Ok(mut private) = self.private.lock() else {
                warn!("private store lock poisoned, dropping message");
                return;
            };
            private.receive(message)
        };

        match outcome {
            Reconciliation::Duplicate => {}
            Reconciliation::Replaced(local_id) => {
                emit_event(
                    &self.events_tx,
                    ClientEvent::PrivateMessageUpdated {
                        conversation,
                        local_id,
                    },
                );
            }
            Reconciliation::Appended => {
                let unread = match self.store.lock() {
                    Ok(mut store) => store.note_inbound(conversation),
                    Err(_) => None,
                };
                emit_event(
                    &self.events_tx,
                    ClientEvent::MessageReceived { conversation, id },
                );
                if let Some(count) = unread {
                    emit_event(
                        &self.events_tx,
                        ClientEvent::UnreadChanged {
                            conversation,
                            count,
                        },
                    );
                    if let Err(e) = self.notifier.message_received(conversation) {
                        warn!(conversation = %conversation, error = %e, "notifier failed");
                    }
                }
            }
        }
    }

    /// Resolve the author, retrying transient failures.  On final failure
    /// the message is dropped; a message without an author cannot be
    /// displayed.
    async fn resolve_author(&self, record: &MessageRecord) -> Option<AuthorProfile> {
        let backend = Arc::clone(&self.backend);
        let user = record.user_id;
        match retry(&self.retry_policy, || backend.lookup_author(user)).await {
            Ok(author) => Some(author),
            Err(e) => {
                warn!(message = %record.id, user = %user, error = %e, "author lookup failed, dropping message");
                None
            }
        }
    }

    /// Rewrite a v1 row as v2 in the background.  Best-effort: the message
    /// was already delivered, the old row stays readable if this fails.
    fn spawn_upgrade(&self, record: &MessageRecord) {
        let Some(upgraded) = self.codec.upgrade(&record.message) else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let policy = self.retry_policy.clone();
        let id = record.id;
        tokio::spawn(async move {
            match retry(&policy, || backend.rewrite_message_body(id, upgraded.clone())).await {
                Ok(()) => debug!(message = %id, "cipher envelope upgraded"),
                Err(e) => warn!(message = %id, error = %e, "cipher upgrade failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;

    use waypoint_shared::models::ConversationInfo;
    use waypoint_shared::types::{MessageId, UserId};

    use crate::backend::MessageDraft;
    use crate::error::BackendError;

    #[derive(Default)]
    struct FakeBackend {
        authors: Mutex<HashMap<UserId, AuthorProfile>>,
        transient_lookup_failures: AtomicU32,
        rewrites: Mutex<Vec<(MessageId, String)>>,
    }

    impl FakeBackend {
        fn with_author(self, name: &str) -> (Self, UserId) {
            let author = AuthorProfile {
                id: UserId::new(),
                display_name: name.to_string(),
            };
            let id = author.id;
            self.authors.lock().unwrap().insert(id, author);
            (self, id)
        }
    }

    impl ChatBackend for FakeBackend {
        async fn insert_message(&self, _draft: MessageDraft) -> Result<MessageRecord, BackendError> {
            unimplemented!("not exercised by router tests")
        }

        async fn fetch_messages(
            &self,
            _conversation: ConversationId,
            _limit: u32,
        ) -> Result<Vec<MessageRecord>, BackendError> {
            Ok(Vec::new())
        }

        async fn fetch_unread_count_since(
            &self,
            _conversation: ConversationId,
            _since: Option<chrono::DateTime<Utc>>,
        ) -> Result<u32, BackendError> {
            Ok(0)
        }

        async fn rewrite_message_body(
            &self,
            id: MessageId,
            body: String,
        ) -> Result<(), BackendError> {
            self.rewrites.lock().unwrap().push((id, body));
            Ok(())
        }

        async fn list_conversations(
            &self,
            _user: UserId,
        ) -> Result<Vec<ConversationInfo>, BackendError> {
            Ok(Vec::new())
        }

        async fn lookup_author(&self, user: UserId) -> Result<AuthorProfile, BackendError> {
            if self
                .transient_lookup_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BackendError::Network("lookup reset".into()));
            }
            self.authors
                .lock()
                .unwrap()
                .get(&user)
                .cloned()
                .ok_or_else(|| BackendError::Validation("unknown user".into()))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicU32,
    }

    impl Notifier for CountingNotifier {
        fn message_received(&self, _conversation: ConversationId) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        router: MessageRouter<FakeBackend, CountingNotifier>,
        store: Arc<Mutex<ChatStore>>,
        private: Arc<Mutex<PrivateChatStore>>,
        kinds: Arc<Mutex<HashMap<ConversationId, ConversationKind>>>,
        notifier: Arc<CountingNotifier>,
        backend: Arc<FakeBackend>,
        codec: Arc<MessageCodec>,
        events: broadcast::Receiver<ClientEvent>,
    }

    fn fixture(backend: FakeBackend) -> Fixture {
        let backend = Arc::new(backend);
        let codec = Arc::new(MessageCodec::new(b"router-test-secret"));
        let notifier = Arc::new(CountingNotifier::default());
        let store = Arc::new(Mutex::new(ChatStore::new(None)));
        let private = Arc::new(Mutex::new(PrivateChatStore::new()));
        let kinds = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, events) = broadcast::channel(64);

        let router = MessageRouter::new(
            Arc::clone(&backend),
            Arc::clone(&codec),
            Arc::clone(&notifier),
            Arc::clone(&store),
            Arc::clone(&private),
            Arc::clone(&kinds),
            events_tx,
            RetryPolicy::default(),
        );

        Fixture {
            router,
            store,
            private,
            kinds,
            notifier,
            backend,
            codec,
            events,
        }
    }

    fn record(conversation: ConversationId, user: UserId, message: String) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(),
            conversation_id: conversation,
            user_id: user,
            message,
            created_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_topic_message_is_decrypted_and_stored() {
        let (backend, user) = FakeBackend::default().with_author("alice");
        let mut fx = fixture(backend);
        let conv = ConversationId::new();

        let ciphertext = fx.codec.encrypt("meet at noon").unwrap();
        fx.router
            .route(RealtimeEvent::MessageInserted(record(conv, user, ciphertext)))
            .await;

        let store = fx.store.lock().unwrap();
        let msgs = store.messages(conv);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].body, "meet at noon");
        assert_eq!(msgs[0].author.display_name, "alice");
        assert_eq!(store.unread_count(conv), 1);
        assert_eq!(fx.notifier.calls.load(Ordering::SeqCst), 1);

        assert!(matches!(
            fx.events.try_recv(),
            Ok(ClientEvent::MessageReceived { .. })
        ));
        assert!(matches!(
            fx.events.try_recv(),
            Ok(ClientEvent::UnreadChanged { count: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redelivered_record_is_dropped() {
        let (backend, user) = FakeBackend::default().with_author("alice");
        let fx = fixture(backend);
        let conv = ConversationId::new();

        let rec = record(conv, user, fx.codec.encrypt("once").unwrap());
        fx.router
            .route(RealtimeEvent::MessageInserted(rec.clone()))
            .await;
        fx.router.route(RealtimeEvent::MessageInserted(rec)).await;

        let store = fx.store.lock().unwrap();
        assert_eq!(store.messages(conv).len(), 1);
        assert_eq!(store.unread_count(conv), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_conversation_does_not_notify() {
        let (backend, user) = FakeBackend::default().with_author("alice");
        let fx = fixture(backend);
        let conv = ConversationId::new();
        fx.store.lock().unwrap().set_current(Some(conv));

        let rec = record(conv, user, fx.codec.encrypt("hi").unwrap());
        fx.router.route(RealtimeEvent::MessageInserted(rec)).await;

        assert_eq!(fx.store.lock().unwrap().unread_count(conv), 0);
        assert_eq!(fx.notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_author_drops_message() {
        let fx = fixture(FakeBackend::default());
        let conv = ConversationId::new();

        let rec = record(conv, UserId::new(), fx.codec.encrypt("ghost").unwrap());
        fx.router.route(RealtimeEvent::MessageInserted(rec)).await;

        assert!(fx.store.lock().unwrap().messages(conv).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_lookup_failure_is_retried() {
        let (backend, user) = FakeBackend::default().with_author("alice");
        backend.transient_lookup_failures.store(1, Ordering::SeqCst);
        let fx = fixture(backend);
        let conv = ConversationId::new();

        // The paused clock auto-advances through the backoff sleep.
        let rec = record(conv, user, fx.codec.encrypt("persistent").unwrap());
        fx.router.route(RealtimeEvent::MessageInserted(rec)).await;

        assert_eq!(fx.store.lock().unwrap().messages(conv).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_v1_message_is_upgraded_in_background() {
        let (backend, user) = FakeBackend::default().with_author("alice");
        let fx = fixture(backend);
        let conv = ConversationId::new();

        let legacy = fx.codec.encrypt_v1("old format");
        let rec = record(conv, user, legacy);
        let id = rec.id;
        fx.router.route(RealtimeEvent::MessageInserted(rec)).await;

        // Let the spawned upgrade task run.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            fx.store.lock().unwrap().messages(conv)[0].body,
            "old format"
        );
        let rewrites = fx.backend.rewrites.lock().unwrap();
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].0, id);
        assert!(rewrites[0].1.starts_with("wp2:"));
        assert_eq!(fx.codec.decrypt(&rewrites[0].1), "old format");
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_message_reconciles_placeholder() {
        let (backend, user) = FakeBackend::default().with_author("me");
        let mut fx = fixture(backend);
        let conv = ConversationId::new();
        fx.kinds
            .lock()
            .unwrap()
            .insert(conv, ConversationKind::Private { peer: UserId::new() });

        let me = fx.backend.authors.lock().unwrap().get(&user).cloned().unwrap();
        let local_id = fx
            .private
            .lock()
            .unwrap()
            .begin_send(conv, me, "hey".into());

        let rec = record(conv, user, fx.codec.encrypt("hey").unwrap());
        fx.router.route(RealtimeEvent::MessageInserted(rec)).await;

        let private = fx.private.lock().unwrap();
        let msgs = private.messages(conv);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].server_id.is_some());
        assert_eq!(
            fx.events.try_recv(),
            Ok(ClientEvent::PrivateMessageUpdated {
                conversation: conv,
                local_id
            })
        );
        // Reconciliation is not an unread event.
        assert_eq!(fx.notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_event_reaches_store() {
        let fx = fixture(FakeBackend::default());
        let conv = ConversationId::new();
        let user = UserId::new();

        fx.router
            .route(RealtimeEvent::Typing {
                conversation: conv,
                user,
                name: "bob".into(),
            })
            .await;

        assert_eq!(fx.store.lock().unwrap().typing_users(conv).len(), 1);
    }
}
