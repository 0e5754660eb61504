//! Connection manager event loop, tokio mpsc command/notification pattern.
//!
//! The manager runs in a dedicated task and owns the transport plus the
//! [`SlotPool`].  External code talks to it through typed commands; decoded
//! [`RealtimeEvent`]s flow out on the notification channel to the message
//! router.  Reconnect backoff and eviction grace delays are one-shot timer
//! tasks that report back through an internal tick channel, tagged with an
//! epoch so `DisconnectAll` invalidates everything in flight.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use waypoint_shared::constants::{
    EVICTION_GRACE, MAX_RECONNECT_ATTEMPTS, MAX_SUBSCRIPTIONS, PRIORITY_CURRENT,
    PRIORITY_RECENT, RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY,
};
use waypoint_shared::types::{ConversationId, Priority};
use waypoint_shared::backoff_delay;

use crate::events::{decode_feed_event, ChannelStatus, OutboundBroadcast, RealtimeEvent, TransportEvent};
use crate::slots::{Activation, ReconnectDecision, SlotPool, SlotState};
use crate::transport::RealtimeTransport;

// ---------------------------------------------------------------------------
// Command / configuration types
// ---------------------------------------------------------------------------

/// Commands sent *into* the manager task.
#[derive(Debug)]
pub enum ManagerCommand {
    /// Open subscriptions for the given conversations, highest priority
    /// first, up to capacity.
    Initialize {
        conversations: Vec<(ConversationId, Priority)>,
    },
    /// Promote a conversation to maximum priority and guarantee it a slot.
    SetCurrentConversation(ConversationId),
    /// Publish a typing/presence broadcast on a conversation's channel.
    Broadcast {
        conversation: ConversationId,
        payload: OutboundBroadcast,
    },
    /// Probe every connected slot; failed probes go through reconnect
    /// scheduling.
    HealthCheck,
    /// Tear down every subscription and cancel pending timers.
    DisconnectAll,
    /// Snapshot of the pool for diagnostics and tests.
    GetSlots(oneshot::Sender<Vec<(ConversationId, SlotState)>>),
    /// Stop the manager task.
    Shutdown,
}

/// Manager tuning knobs.  Defaults come from the shared constants.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub max_subscriptions: usize,
    pub max_reconnect_attempts: u32,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    pub eviction_grace: Duration,
    pub channel_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_subscriptions: MAX_SUBSCRIPTIONS,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_base: RECONNECT_BASE_DELAY,
            reconnect_max: RECONNECT_MAX_DELAY,
            eviction_grace: EVICTION_GRACE,
            channel_capacity: 256,
        }
    }
}

#[derive(Debug)]
enum Tick {
    Reconnect { conversation: ConversationId, epoch: u64 },
    Evict { conversation: ConversationId, epoch: u64 },
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the connection manager in a background tokio task.
///
/// Returns the command channel and the decoded-event notification channel.
pub fn spawn_connection_manager<T: RealtimeTransport>(
    transport: T,
    config: ManagerConfig,
) -> (mpsc::Sender<ManagerCommand>, mpsc::Receiver<RealtimeEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::channel::<ManagerCommand>(config.channel_capacity);
    let (event_tx, event_rx) = mpsc::channel::<RealtimeEvent>(config.channel_capacity);
    let (transport_tx, transport_rx) = mpsc::channel::<TransportEvent>(config.channel_capacity);
    let (tick_tx, tick_rx) = mpsc::channel::<Tick>(config.channel_capacity);

    let manager = Manager {
        pool: SlotPool::new(config.max_subscriptions, config.max_reconnect_attempts),
        transport,
        config,
        epoch: 0,
        pending_activation: HashMap::new(),
        transport_tx,
        tick_tx,
        event_tx,
    };

    tokio::spawn(manager.run(cmd_rx, transport_rx, tick_rx));

    (cmd_tx, event_rx)
}

struct Manager<T: RealtimeTransport> {
    pool: SlotPool,
    transport: T,
    config: ManagerConfig,
    /// Bumped by `DisconnectAll`; ticks from an older epoch are stale.
    epoch: u64,
    /// Activations parked behind an eviction grace timer, keyed by victim.
    /// One victim can accumulate several replacements while its timer runs.
    pending_activation: HashMap<ConversationId, Vec<(ConversationId, Priority)>>,
    transport_tx: mpsc::Sender<TransportEvent>,
    tick_tx: mpsc::Sender<Tick>,
    event_tx: mpsc::Sender<RealtimeEvent>,
}

impl<T: RealtimeTransport> Manager<T> {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<ManagerCommand>,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        mut tick_rx: mpsc::Receiver<Tick>,
    ) {
        info!("connection manager started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ManagerCommand::Initialize { conversations }) => {
                            self.initialize(conversations);
                        }
                        Some(ManagerCommand::SetCurrentConversation(id)) => {
                            self.pool.set_current(id);
                            self.activate(id, PRIORITY_CURRENT);
                        }
                        Some(ManagerCommand::Broadcast { conversation, payload }) => {
                            // Typing/presence broadcasts are best-effort.
                            if let Err(e) = self.transport.broadcast(conversation, &payload) {
                                warn!(conversation = %conversation, error = %e, "broadcast failed");
                            }
                        }
                        Some(ManagerCommand::HealthCheck) => {
                            self.health_check();
                        }
                        Some(ManagerCommand::DisconnectAll) => {
                            self.disconnect_all();
                        }
                        Some(ManagerCommand::GetSlots(reply)) => {
                            let _ = reply.send(self.pool.snapshot());
                        }
                        Some(ManagerCommand::Shutdown) => {
                            info!("manager shutdown requested");
                            self.disconnect_all();
                            break;
                        }
                        None => {
                            info!("command channel closed, shutting down manager");
                            self.disconnect_all();
                            break;
                        }
                    }
                }

                Some(event) = transport_rx.recv() => {
                    self.on_transport_event(event).await;
                }

                Some(tick) = tick_rx.recv() => {
                    self.on_tick(tick);
                }
            }
        }

        info!("connection manager terminated");
    }

    fn initialize(&mut self, mut conversations: Vec<(ConversationId, Priority)>) {
        conversations.sort_by(|a, b| b.1.cmp(&a.1));
        info!(count = conversations.len(), "initializing subscriptions");
        for (id, priority) in conversations {
            self.activate(id, priority);
        }
    }

    fn activate(&mut self, id: ConversationId, priority: Priority) {
        match self.pool.activate(id, priority) {
            Activation::Promoted => {
                debug!(conversation = %id, priority, "subscription promoted");
            }
            Activation::Open => {
                self.open_slot(id);
            }
            Activation::Evict(victim) => {
                debug!(victim = %victim, replacement = %id, "scheduling eviction");
                // A victim already mid-grace keeps its timer; the new
                // replacement just joins the queue behind it.
                let timer_running = self.pool.is_evicting(victim);
                self.pool.begin_eviction(victim);
                self.pending_activation
                    .entry(victim)
                    .or_default()
                    .push((id, priority));
                if !timer_running {
                    self.schedule_tick(
                        Tick::Evict { conversation: victim, epoch: self.epoch },
                        self.config.eviction_grace,
                    );
                }
            }
            Activation::Rejected => {
                debug!(conversation = %id, priority, "no slot available");
            }
        }
    }

    fn open_slot(&mut self, id: ConversationId) {
        debug!(conversation = %id, "opening subscription");
        if let Err(e) = self.transport.open(id, self.transport_tx.clone()) {
            warn!(conversation = %id, error = %e, "subscribe failed");
            self.handle_failure(id);
        }
    }

    fn health_check(&mut self) {
        let connected = self.pool.connected_ids();
        debug!(slots = connected.len(), "health check");
        for id in connected {
            if let Err(e) = self.transport.probe(id) {
                warn!(conversation = %id, error = %e, "probe failed");
                self.handle_failure(id);
            }
        }
    }

    fn disconnect_all(&mut self) {
        self.epoch += 1;
        self.pending_activation.clear();
        let open = self.pool.clear();
        info!(count = open.len(), "disconnecting all subscriptions");
        for id in open {
            self.transport.close(id);
        }
    }

    fn handle_failure(&mut self, id: ConversationId) {
        match self.pool.on_failure(id) {
            Some(ReconnectDecision::Schedule { attempt }) => {
                let delay = backoff_delay(
                    self.config.reconnect_base,
                    self.config.reconnect_max,
                    attempt,
                );
                debug!(conversation = %id, attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
                self.schedule_tick(
                    Tick::Reconnect { conversation: id, epoch: self.epoch },
                    delay,
                );
            }
            Some(ReconnectDecision::AlreadyPending) => {
                debug!(conversation = %id, "reconnect already scheduled");
            }
            Some(ReconnectDecision::Drop) => {
                warn!(conversation = %id, "subscription abandoned after repeated failures");
                self.transport.close(id);
            }
            None => {
                debug!(conversation = %id, "failure for unknown slot, ignoring");
            }
        }
    }

    fn schedule_tick(&self, tick: Tick, delay: Duration) {
        let tick_tx = self.tick_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tick_tx.send(tick).await;
        });
    }

    fn on_tick(&mut self, tick: Tick) {
        match tick {
            Tick::Reconnect { conversation, epoch } => {
                if epoch != self.epoch {
                    return;
                }
                if self.pool.begin_reconnect(conversation) {
                    debug!(conversation = %conversation, "reconnecting");
                    // Drop the broken channel before re-opening.
                    self.transport.close(conversation);
                    self.open_slot(conversation);
                }
            }
            Tick::Evict { conversation, epoch } => {
                if epoch != self.epoch {
                    return;
                }
                let queued = self.pending_activation.remove(&conversation).unwrap_or_default();
                if self.pool.is_evicting(conversation) {
                    debug!(conversation = %conversation, "evicting subscription");
                    self.pool.remove(conversation);
                    self.transport.close(conversation);
                }
                // Re-run every parked activation either way: if the victim
                // was re-promoted during the grace window, each one picks a
                // different victim or rejects.  A parked promotion whose
                // conversation is no longer current opens at the demoted
                // priority, same as a live demotion.
                for (id, priority) in queued {
                    let priority = if self.pool.current() == Some(id) {
                        priority
                    } else {
                        priority.min(PRIORITY_RECENT)
                    };
                    self.activate(id, priority);
                }
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Status(id, ChannelStatus::Subscribed) => {
                debug!(conversation = %id, "subscribed");
                self.pool.mark_connected(id);
            }
            TransportEvent::Status(id, ChannelStatus::ChannelError)
            | TransportEvent::Status(id, ChannelStatus::TimedOut) => {
                warn!(conversation = %id, "subscription error");
                self.handle_failure(id);
            }
            TransportEvent::Status(id, ChannelStatus::Closed) => {
                // Explicit teardown removes the slot before closing, so a
                // close for a known slot is unexpected.
                if self.pool.contains(id) && !self.pool.is_evicting(id) {
                    warn!(conversation = %id, "subscription closed unexpectedly");
                    self.handle_failure(id);
                }
            }
            TransportEvent::Feed(id, raw) => {
                self.pool.note_activity(id);
                if let Some(decoded) = decode_feed_event(id, &raw) {
                    if self.event_tx.send(decoded).await.is_err() {
                        warn!("event receiver dropped, discarding feed event");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::transport::TransportError;
    use waypoint_shared::models::MessageRecord;
    use waypoint_shared::types::{MessageId, UserId};

    #[derive(Default)]
    struct FakeInner {
        opens: Vec<ConversationId>,
        closes: Vec<ConversationId>,
        probes: Vec<ConversationId>,
        broadcasts: Vec<(ConversationId, &'static str)>,
        events_tx: Option<mpsc::Sender<TransportEvent>>,
        fail_probe: bool,
        auto_subscribe: bool,
    }

    #[derive(Clone)]
    struct FakeTransport {
        inner: Arc<Mutex<FakeInner>>,
    }

    impl FakeTransport {
        fn new(auto_subscribe: bool) -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeInner {
                    auto_subscribe,
                    ..FakeInner::default()
                })),
            }
        }

        fn opens(&self) -> Vec<ConversationId> {
            self.inner.lock().unwrap().opens.clone()
        }

        fn closes(&self) -> Vec<ConversationId> {
            self.inner.lock().unwrap().closes.clone()
        }

        async fn emit(&self, event: TransportEvent) {
            let tx = self.inner.lock().unwrap().events_tx.clone().unwrap();
            tx.send(event).await.unwrap();
        }
    }

    impl RealtimeTransport for FakeTransport {
        fn open(
            &mut self,
            conversation: ConversationId,
            events: mpsc::Sender<TransportEvent>,
        ) -> Result<(), TransportError> {
            let mut inner = self.inner.lock().unwrap();
            inner.opens.push(conversation);
            if inner.auto_subscribe {
                let _ = events.try_send(TransportEvent::Status(
                    conversation,
                    ChannelStatus::Subscribed,
                ));
            }
            inner.events_tx = Some(events);
            Ok(())
        }

        fn close(&mut self, conversation: ConversationId) {
            self.inner.lock().unwrap().closes.push(conversation);
        }

        fn broadcast(
            &mut self,
            conversation: ConversationId,
            payload: &OutboundBroadcast,
        ) -> Result<(), TransportError> {
            self.inner
                .lock()
                .unwrap()
                .broadcasts
                .push((conversation, payload.kind()));
            Ok(())
        }

        fn probe(&mut self, conversation: ConversationId) -> Result<(), TransportError> {
            let mut inner = self.inner.lock().unwrap();
            inner.probes.push(conversation);
            if inner.fail_probe {
                Err(TransportError::Probe { conversation })
            } else {
                Ok(())
            }
        }
    }

    fn config(capacity: usize) -> ManagerConfig {
        ManagerConfig {
            max_subscriptions: capacity,
            ..ManagerConfig::default()
        }
    }

    /// Let the manager task drain its channels without advancing time.
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    async fn slots(cmd_tx: &mpsc::Sender<ManagerCommand>) -> Vec<(ConversationId, SlotState)> {
        let (tx, rx) = oneshot::channel();
        cmd_tx.send(ManagerCommand::GetSlots(tx)).await.unwrap();
        rx.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_opens_highest_priority_first_up_to_capacity() {
        let transport = FakeTransport::new(true);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let a = ConversationId::new();
        let b = ConversationId::new();
        let c = ConversationId::new();

        cmd_tx
            .send(ManagerCommand::Initialize {
                conversations: vec![(a, 1), (b, 3), (c, 2)],
            })
            .await
            .unwrap();
        settle().await;

        // Only the two highest-priority conversations got slots.
        assert_eq!(transport.opens(), vec![b, c]);
        assert_eq!(slots(&cmd_tx).await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_conversation_evicts_lowest_priority_after_grace() {
        let transport = FakeTransport::new(true);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let low = ConversationId::new();
        let high = ConversationId::new();
        let current = ConversationId::new();

        cmd_tx
            .send(ManagerCommand::Initialize {
                conversations: vec![(low, 1), (high, 2)],
            })
            .await
            .unwrap();
        settle().await;

        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(current))
            .await
            .unwrap();
        settle().await;

        // Still parked behind the grace delay.
        assert!(transport.closes().is_empty());

        tokio::time::advance(EVICTION_GRACE + Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(transport.closes(), vec![low]);
        assert!(transport.opens().contains(&current));

        let snapshot = slots(&cmd_tx).await;
        assert_eq!(snapshot.len(), 2);
        let ids: Vec<_> = snapshot.iter().map(|(id, _)| *id).collect();
        assert!(ids.contains(&high) && ids.contains(&current));
        assert!(!ids.contains(&low));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_promotions_in_one_grace_window_both_get_slots() {
        let transport = FakeTransport::new(true);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let low = ConversationId::new();
        let high = ConversationId::new();
        let first = ConversationId::new();
        let second = ConversationId::new();

        cmd_tx
            .send(ManagerCommand::Initialize {
                conversations: vec![(low, 1), (high, 2)],
            })
            .await
            .unwrap();
        settle().await;

        // Two quick conversation switches before the first eviction grace
        // timer fires.  Both pick the same victim; neither replacement may
        // be lost.
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(first))
            .await
            .unwrap();
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(second))
            .await
            .unwrap();
        settle().await;

        tokio::time::advance(EVICTION_GRACE + Duration::from_millis(1)).await;
        settle().await;
        tokio::time::advance(EVICTION_GRACE + Duration::from_millis(1)).await;
        settle().await;

        let snapshot = slots(&cmd_tx).await;
        let ids: Vec<_> = snapshot.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first) && ids.contains(&second));
        assert!(transport.closes().contains(&low));
        assert!(transport.closes().contains(&high));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backoff_then_ceiling_drops_slot() {
        let transport = FakeTransport::new(false);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let a = ConversationId::new();
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(a))
            .await
            .unwrap();
        settle().await;
        assert_eq!(transport.opens().len(), 1);

        // First failure: reconnect after the base delay.
        transport
            .emit(TransportEvent::Status(a, ChannelStatus::ChannelError))
            .await;
        settle().await;
        assert_eq!(transport.opens().len(), 1);

        tokio::time::advance(RECONNECT_BASE_DELAY + Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(transport.opens().len(), 2);

        // Second failure: doubled delay.
        transport
            .emit(TransportEvent::Status(a, ChannelStatus::ChannelError))
            .await;
        settle().await;
        tokio::time::advance(RECONNECT_BASE_DELAY * 2 + Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(transport.opens().len(), 3);

        // Third consecutive failure exhausts the ceiling: slot dropped,
        // no further reconnects ever.
        transport
            .emit(TransportEvent::Status(a, ChannelStatus::ChannelError))
            .await;
        settle().await;
        assert!(slots(&cmd_tx).await.is_empty());

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(transport.opens().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_error_does_not_double_schedule() {
        let transport = FakeTransport::new(false);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let a = ConversationId::new();
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(a))
            .await
            .unwrap();
        settle().await;

        transport
            .emit(TransportEvent::Status(a, ChannelStatus::ChannelError))
            .await;
        transport
            .emit(TransportEvent::Status(a, ChannelStatus::TimedOut))
            .await;
        settle().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        // One scheduled reconnect, not two.
        assert_eq!(transport.opens().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_failure_routes_through_reconnect() {
        let transport = FakeTransport::new(true);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let a = ConversationId::new();
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(a))
            .await
            .unwrap();
        settle().await;

        transport.inner.lock().unwrap().fail_probe = true;
        cmd_tx.send(ManagerCommand::HealthCheck).await.unwrap();
        settle().await;

        transport.inner.lock().unwrap().fail_probe = false;
        tokio::time::advance(RECONNECT_BASE_DELAY + Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(transport.opens().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_all_closes_and_cancels_pending_timers() {
        let transport = FakeTransport::new(false);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let a = ConversationId::new();
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(a))
            .await
            .unwrap();
        settle().await;

        // Leave a reconnect timer pending, then disconnect.
        transport
            .emit(TransportEvent::Status(a, ChannelStatus::ChannelError))
            .await;
        settle().await;
        cmd_tx.send(ManagerCommand::DisconnectAll).await.unwrap();
        settle().await;

        assert!(transport.closes().contains(&a));
        assert!(slots(&cmd_tx).await.is_empty());

        // The stale timer must not resurrect the subscription.
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(transport.opens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_events_are_decoded_and_forwarded() {
        let transport = FakeTransport::new(true);
        let (cmd_tx, mut event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let a = ConversationId::new();
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(a))
            .await
            .unwrap();
        settle().await;

        let record = MessageRecord {
            id: MessageId::new(),
            conversation_id: a,
            user_id: UserId::new(),
            message: "wp2:payload".into(),
            created_at: chrono::Utc::now(),
        };
        transport
            .emit(TransportEvent::Feed(
                a,
                crate::events::RawFeedEvent {
                    kind: "insert".into(),
                    payload: serde_json::to_value(&record).unwrap(),
                },
            ))
            .await;
        settle().await;

        match event_rx.try_recv() {
            Ok(RealtimeEvent::MessageInserted(got)) => assert_eq!(got.id, record.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_goes_out_on_the_conversation_channel() {
        let transport = FakeTransport::new(true);
        let (cmd_tx, _event_rx) = spawn_connection_manager(transport.clone(), config(2));

        let a = ConversationId::new();
        cmd_tx
            .send(ManagerCommand::SetCurrentConversation(a))
            .await
            .unwrap();
        settle().await;

        cmd_tx
            .send(ManagerCommand::Broadcast {
                conversation: a,
                payload: OutboundBroadcast::Typing {
                    user: UserId::new(),
                    name: "Lena".into(),
                    at: chrono::Utc::now(),
                },
            })
            .await
            .unwrap();
        settle().await;

        assert_eq!(
            transport.inner.lock().unwrap().broadcasts,
            vec![(a, "typing")]
        );
    }
}
