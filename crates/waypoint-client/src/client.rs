//! The [`ChatClient`] orchestrator.
//!
//! Owns the stores, the codec, and the channels to the connection manager,
//! and spawns the router loop that feeds decoded realtime events into the
//! stores.  All methods are cheap to call from UI code; backend round trips
//! go through the shared retry policy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use waypoint_net::events::OutboundBroadcast;
use waypoint_net::manager::{spawn_connection_manager, ManagerCommand, ManagerConfig};
use waypoint_net::transport::RealtimeTransport;
use waypoint_shared::constants::MAX_MESSAGE_LEN;
use waypoint_shared::models::{AuthorProfile, ChatMessage, ConversationKind, MessageRecord};
use waypoint_shared::types::{ConversationId, MessageId, Priority, UserId};
use waypoint_shared::{retry, CipherVersion, MessageCodec, RetryPolicy};

use crate::backend::{ChatBackend, MessageDraft, Notifier};
use crate::error::ClientError;
use crate::events::{emit_event, ClientEvent};
use crate::private::{PrivateChatStore, PrivateMessage};
use crate::router::MessageRouter;
use crate::store::ChatStore;
use waypoint_store::Database;

/// Client-side chat engine facade.
pub struct ChatClient<B> {
    backend: Arc<B>,
    codec: Arc<MessageCodec>,
    store: Arc<Mutex<ChatStore>>,
    private: Arc<Mutex<PrivateChatStore>>,
    kinds: Arc<Mutex<HashMap<ConversationId, ConversationKind>>>,
    profile: Mutex<Option<AuthorProfile>>,
    manager_tx: mpsc::Sender<ManagerCommand>,
    events_tx: broadcast::Sender<ClientEvent>,
    retry_policy: RetryPolicy,
}

impl<B: ChatBackend> ChatClient<B> {
    /// Build the client: spawns the connection manager and the router loop.
    ///
    /// `secret` is the application message secret the codec derives its
    /// keys from.  `durable` is the optional local database for read-state
    /// persistence.
    pub fn new<T: RealtimeTransport, N: Notifier>(
        backend: B,
        transport: T,
        notifier: N,
        secret: &[u8],
        durable: Option<Database>,
        config: ManagerConfig,
    ) -> Arc<Self> {
        let backend = Arc::new(backend);
        let codec = Arc::new(MessageCodec::new(secret));
        let store = Arc::new(Mutex::new(ChatStore::new(durable)));
        let private = Arc::new(Mutex::new(PrivateChatStore::new()));
        let kinds = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, _) = broadcast::channel(256);
        let retry_policy = RetryPolicy::default();

        let (manager_tx, mut event_rx) = spawn_connection_manager(transport, config);

        let router = MessageRouter::new(
            Arc::clone(&backend),
            Arc::clone(&codec),
            Arc::new(notifier),
            Arc::clone(&store),
            Arc::clone(&private),
            Arc::clone(&kinds),
            events_tx.clone(),
            retry_policy.clone(),
        );
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                router.route(event).await;
            }
            debug!("realtime event channel closed, router loop exiting");
        });

        Arc::new(Self {
            backend,
            codec,
            store,
            private,
            kinds,
            profile: Mutex::new(None),
            manager_tx,
            events_tx,
            retry_policy,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Resolve the signed-in user, discover their conversations, hydrate
    /// unread counters, and open realtime subscriptions by recency.
    pub async fn initialize(&self, user: UserId) -> Result<(), ClientError> {
        let backend = Arc::clone(&self.backend);
        let profile = retry(&self.retry_policy, || backend.lookup_author(user)).await?;
        info!(user = %profile.id, name = %profile.display_name, "chat client initializing");
        *self
            .profile
            .lock()
            .map_err(|_| ClientError::StatePoisoned)? = Some(profile);

        let mut conversations =
            retry(&self.retry_policy, || backend.list_conversations(user)).await?;

        {
            let mut kinds = self.kinds.lock().map_err(|_| ClientError::StatePoisoned)?;
            for info in &conversations {
                kinds.insert(info.id, info.kind.clone());
            }
        }

        for info in &conversations {
            self.hydrate_unread(info.id).await;
        }

        // Most recently active conversations get the highest priority and
        // therefore the subscription slots.
        conversations.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        let ranked: Vec<(ConversationId, Priority)> = conversations
            .iter()
            .enumerate()
            .map(|(rank, info)| (info.id, (conversations.len() - rank) as Priority))
            .collect();

        self.manager_tx
            .send(ManagerCommand::Initialize {
                conversations: ranked,
            })
            .await
            .map_err(|_| ClientError::ManagerUnavailable)
    }

    /// Probe all open subscriptions; broken ones go through reconnect.
    pub async fn health_check(&self) -> Result<(), ClientError> {
        self.manager_tx
            .send(ManagerCommand::HealthCheck)
            .await
            .map_err(|_| ClientError::ManagerUnavailable)
    }

    /// Tear down every subscription (app backgrounded, sign-out).
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.manager_tx
            .send(ManagerCommand::DisconnectAll)
            .await
            .map_err(|_| ClientError::ManagerUnavailable)
    }

    /// Stop the connection manager task.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.manager_tx
            .send(ManagerCommand::Shutdown)
            .await
            .map_err(|_| ClientError::ManagerUnavailable)
    }

    /// Subscribe to state-change events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Conversation focus
    // -----------------------------------------------------------------------

    /// Open a conversation in the UI: marks it read, stops unread
    /// accounting for it, and guarantees it a subscription slot.
    pub async fn open_conversation(&self, conversation: ConversationId) -> Result<(), ClientError> {
        {
            let mut store = self.store.lock().map_err(|_| ClientError::StatePoisoned)?;
            store.set_current(Some(conversation));
            if store.mark_as_read(conversation) {
                emit_event(
                    &self.events_tx,
                    ClientEvent::UnreadChanged {
                        conversation,
                        count: 0,
                    },
                );
            }
        }
        self.manager_tx
            .send(ManagerCommand::SetCurrentConversation(conversation))
            .await
            .map_err(|_| ClientError::ManagerUnavailable)
    }

    /// Leave the currently open conversation.
    pub fn close_conversation(&self) -> Result<(), ClientError> {
        self.store
            .lock()
            .map_err(|_| ClientError::StatePoisoned)?
            .set_current(None);
        Ok(())
    }

    /// Mark a conversation read (debounced in the store).
    pub fn mark_as_read(&self, conversation: ConversationId) -> Result<bool, ClientError> {
        let marked = self
            .store
            .lock()
            .map_err(|_| ClientError::StatePoisoned)?
            .mark_as_read(conversation);
        if marked {
            emit_event(
                &self.events_tx,
                ClientEvent::UnreadChanged {
                    conversation,
                    count: 0,
                },
            );
        }
        Ok(marked)
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Send a message to a topic conversation.
    ///
    /// Not optimistic: the message appears in the store only once the
    /// backend has acknowledged it.
    pub async fn send_message(
        &self,
        conversation: ConversationId,
        body: &str,
    ) -> Result<MessageId, ClientError> {
        let body = validate_body(body)?;
        let author = self.require_profile()?;

        let draft = MessageDraft {
            conversation_id: conversation,
            user_id: author.id,
            body: self.codec.encrypt(body)?,
            created_at: Utc::now(),
        };

        let backend = Arc::clone(&self.backend);
        let record = retry(&self.retry_policy, || backend.insert_message(draft.clone())).await?;
        let id = record.id;

        {
            let mut store = self.store.lock().map_err(|_| ClientError::StatePoisoned)?;
            store.insert_message(ChatMessage {
                id,
                conversation_id: conversation,
                author,
                body: body.to_string(),
                created_at: record.created_at,
            });
        }
        emit_event(
            &self.events_tx,
            ClientEvent::MessageSent { conversation, id },
        );
        Ok(id)
    }

    /// Send a private message optimistically: the placeholder is visible
    /// immediately, then reconciled or flagged failed.
    pub async fn send_private_message(
        &self,
        conversation: ConversationId,
        body: &str,
    ) -> Result<Uuid, ClientError> {
        let body = validate_body(body)?.to_string();
        let author = self.require_profile()?;

        let local_id = self
            .private
            .lock()
            .map_err(|_| ClientError::StatePoisoned)?
            .begin_send(conversation, author.clone(), body.clone());
        emit_event(
            &self.events_tx,
            ClientEvent::PrivateMessageUpdated {
                conversation,
                local_id,
            },
        );

        self.finish_private_send(conversation, local_id, author.id, &body)
            .await?;
        Ok(local_id)
    }

    /// Re-send a failed private message, reusing its placeholder.
    pub async fn retry_private_message(
        &self,
        conversation: ConversationId,
        local_id: Uuid,
    ) -> Result<(), ClientError> {
        let author = self.require_profile()?;
        let body = self
            .private
            .lock()
            .map_err(|_| ClientError::StatePoisoned)?
            .take_for_retry(conversation, local_id)
            .ok_or(ClientError::UnknownMessage)?;
        emit_event(
            &self.events_tx,
            ClientEvent::PrivateMessageUpdated {
                conversation,
                local_id,
            },
        );

        self.finish_private_send(conversation, local_id, author.id, &body)
            .await
    }

    async fn finish_private_send(
        &self,
        conversation: ConversationId,
        local_id: Uuid,
        user_id: UserId,
        body: &str,
    ) -> Result<(), ClientError> {
        let draft = MessageDraft {
            conversation_id: conversation,
            user_id,
            body: self.codec.encrypt(body)?,
            created_at: Utc::now(),
        };

        let backend = Arc::clone(&self.backend);
        let result = retry(&self.retry_policy, || backend.insert_message(draft.clone())).await;

        let mut private = self.private.lock().map_err(|_| ClientError::StatePoisoned)?;
        match result {
            Ok(record) => {
                private.mark_sent(conversation, local_id, record.id, record.created_at);
                drop(private);
                emit_event(
                    &self.events_tx,
                    ClientEvent::PrivateMessageUpdated {
                        conversation,
                        local_id,
                    },
                );
                Ok(())
            }
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "private send failed");
                private.mark_failed(conversation, local_id);
                drop(private);
                emit_event(
                    &self.events_tx,
                    ClientEvent::PrivateMessageUpdated {
                        conversation,
                        local_id,
                    },
                );
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Typing broadcasts
    // -----------------------------------------------------------------------

    pub async fn typing_started(&self, conversation: ConversationId) -> Result<(), ClientError> {
        let author = self.require_profile()?;
        self.broadcast(
            conversation,
            OutboundBroadcast::Typing {
                user: author.id,
                name: author.display_name,
                at: Utc::now(),
            },
        )
        .await
    }

    pub async fn typing_stopped(&self, conversation: ConversationId) -> Result<(), ClientError> {
        let author = self.require_profile()?;
        self.broadcast(conversation, OutboundBroadcast::StopTyping { user: author.id })
            .await
    }

    async fn broadcast(
        &self,
        conversation: ConversationId,
        payload: OutboundBroadcast,
    ) -> Result<(), ClientError> {
        self.manager_tx
            .send(ManagerCommand::Broadcast {
                conversation,
                payload,
            })
            .await
            .map_err(|_| ClientError::ManagerUnavailable)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Fetch recent history for a conversation and merge it into the
    /// stores.  Records whose author cannot be resolved are skipped;
    /// legacy-cipher rows are upgraded in the background.
    pub async fn load_history(
        &self,
        conversation: ConversationId,
        limit: u32,
    ) -> Result<(), ClientError> {
        let backend = Arc::clone(&self.backend);
        let records = retry(&self.retry_policy, || {
            backend.fetch_messages(conversation, limit)
        })
        .await?;

        let kind = self
            .kinds
            .lock()
            .map_err(|_| ClientError::StatePoisoned)?
            .get(&conversation)
            .cloned()
            .unwrap_or(ConversationKind::Topic);

        let mut authors: HashMap<UserId, AuthorProfile> = HashMap::new();
        for record in records {
            let author = match authors.get(&record.user_id) {
                Some(author) => author.clone(),
                None => {
                    let user = record.user_id;
                    match retry(&self.retry_policy, || backend.lookup_author(user)).await {
                        Ok(author) => {
                            authors.insert(user, author.clone());
                            author
                        }
                        Err(e) => {
                            warn!(message = %record.id, user = %user, error = %e, "author lookup failed, skipping history row");
                            continue;
                        }
                    }
                }
            };

            if MessageCodec::version_of(&record.message) == Some(CipherVersion::V1) {
                self.spawn_upgrade(&record);
            }

            let message = ChatMessage {
                id: record.id,
                conversation_id: conversation,
                author,
                body: self.codec.decrypt(&record.message),
                created_at: record.created_at,
            };

            match kind {
                ConversationKind::Topic => {
                    self.store
                        .lock()
                        .map_err(|_| ClientError::StatePoisoned)?
                        .insert_message(message);
                }
                ConversationKind::Private { .. } => {
                    self.private
                        .lock()
                        .map_err(|_| ClientError::StatePoisoned)?
                        .receive(message);
                }
            }
        }
        Ok(())
    }

    /// Seed the unread counter for a conversation: persisted value first,
    /// then the backend count since the last read.  Best-effort.
    async fn hydrate_unread(&self, conversation: ConversationId) {
        let persisted = match self.store.lock() {
            Ok(store) => store.persisted_read_state(conversation),
            Err(_) => None,
        };
        let last_read_at = persisted.as_ref().and_then(|s| s.last_read_at);
        if let Some(state) = &persisted {
            if let Ok(mut store) = self.store.lock() {
                store.set_unread(conversation, state.unread_count);
            }
        }

        match self
            .backend
            .fetch_unread_count_since(conversation, last_read_at)
            .await
        {
            Ok(count) => {
                if let Ok(mut store) = self.store.lock() {
                    store.set_unread(conversation, count);
                }
                if count > 0 {
                    emit_event(
                        &self.events_tx,
                        ClientEvent::UnreadChanged {
                            conversation,
                            count,
                        },
                    );
                }
            }
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "unread hydration failed");
            }
        }
    }

    fn spawn_upgrade(&self, record: &MessageRecord) {
        let Some(upgraded) = self.codec.upgrade(&record.message) else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let policy = self.retry_policy.clone();
        let id = record.id;
        tokio::spawn(async move {
            if let Err(e) =
                retry(&policy, || backend.rewrite_message_body(id, upgraded.clone())).await
            {
                warn!(message = %id, error = %e, "cipher upgrade failed");
            }
        });
    }

    fn require_profile(&self) -> Result<AuthorProfile, ClientError> {
        self.profile
            .lock()
            .map_err(|_| ClientError::StatePoisoned)?
            .clone()
            .ok_or(ClientError::NotInitialized)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn messages(&self, conversation: ConversationId) -> Vec<ChatMessage> {
        match self.store.lock() {
            Ok(store) => store.messages(conversation).to_vec(),
            Err(_) => Vec::new(),
        }
    }

    pub fn private_messages(&self, conversation: ConversationId) -> Vec<PrivateMessage> {
        match self.private.lock() {
            Ok(private) => private.messages(conversation).to_vec(),
            Err(_) => Vec::new(),
        }
    }

    pub fn typing_users(&self, conversation: ConversationId) -> Vec<(UserId, String)> {
        match self.store.lock() {
            Ok(mut store) => store.typing_users(conversation),
            Err(_) => Vec::new(),
        }
    }

    pub fn online_users(&self, conversation: ConversationId) -> Vec<(UserId, String)> {
        match self.store.lock() {
            Ok(mut store) => store.online_users(conversation),
            Err(_) => Vec::new(),
        }
    }

    pub fn unread_count(&self, conversation: ConversationId) -> u32 {
        match self.store.lock() {
            Ok(store) => store.unread_count(conversation),
            Err(_) => 0,
        }
    }

    pub fn search_messages(&self, conversation: ConversationId, query: &str) -> Vec<ChatMessage> {
        match self.store.lock() {
            Ok(mut store) => store.search(conversation, query).to_vec(),
            Err(_) => Vec::new(),
        }
    }
}

fn validate_body(body: &str) -> Result<&str, ClientError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidMessage("empty message".into()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(ClientError::InvalidMessage(format!(
            "message exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(trimmed)
}
