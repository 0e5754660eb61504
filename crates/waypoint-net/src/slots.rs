//! Subscription slot bookkeeping.
//!
//! Pure in-memory state, no I/O: the manager task asks the pool what to do
//! (open, evict, schedule a reconnect, give up) and performs the transport
//! calls itself.  Keeping the pool synchronous makes every capacity and
//! reconnect invariant unit-testable without a transport.

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::debug;

use waypoint_shared::constants::PRIORITY_RECENT;
use waypoint_shared::types::{ConversationId, Priority};

/// Lifecycle of one subscription slot.
///
/// `Disconnected -> Connecting -> Connected`, with
/// `Connected -> Error -> Connecting` on scheduled reconnects and removal
/// once reconnect attempts are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    priority: Priority,
    /// Consecutive failed connection attempts.  Reset on successful connect.
    attempts: u32,
    /// A reconnect timer is already scheduled; further schedule requests
    /// are no-ops until it fires.
    reconnect_pending: bool,
    /// Marked for teardown once the eviction grace timer fires.
    evicting: bool,
    last_activity: Instant,
}

impl Slot {
    fn new(priority: Priority) -> Self {
        Self {
            state: SlotState::Connecting,
            priority,
            attempts: 0,
            reconnect_pending: false,
            evicting: false,
            last_activity: Instant::now(),
        }
    }
}

/// What the manager should do after an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Already subscribed; priority was bumped (and any pending eviction
    /// cancelled).
    Promoted,
    /// A slot was allocated; open the transport subscription.
    Open,
    /// Pool is full; tear down this victim (after the grace delay), then
    /// retry the activation.
    Evict(ConversationId),
    /// Pool is full and nothing has lower priority.
    Rejected,
}

/// What the manager should do after a slot failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule a reconnect timer for the given zero-based attempt.
    Schedule { attempt: u32 },
    /// A reconnect is already scheduled for this slot.
    AlreadyPending,
    /// Attempts exhausted; the slot has been removed from the pool.
    Drop,
}

/// Bounded, priority-ranked set of subscription slots.
#[derive(Debug)]
pub struct SlotPool {
    slots: HashMap<ConversationId, Slot>,
    capacity: usize,
    max_attempts: u32,
    current: Option<ConversationId>,
}

impl SlotPool {
    pub fn new(capacity: usize, max_attempts: u32) -> Self {
        Self {
            slots: HashMap::new(),
            capacity,
            max_attempts,
            current: None,
        }
    }

    /// Request a slot for `id` at `priority`.
    ///
    /// The eviction victim, when one is needed, is the lowest-priority slot,
    /// ties broken by least-recently-active.  The current conversation is
    /// never chosen.
    pub fn activate(&mut self, id: ConversationId, priority: Priority) -> Activation {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.priority = slot.priority.max(priority);
            slot.evicting = false;
            slot.last_activity = Instant::now();
            return Activation::Promoted;
        }

        if self.slots.len() < self.capacity {
            self.slots.insert(id, Slot::new(priority));
            return Activation::Open;
        }

        let victim = self
            .slots
            .iter()
            .filter(|&(cid, slot)| Some(*cid) != self.current && slot.priority < priority)
            .min_by_key(|(_, slot)| (slot.priority, slot.last_activity))
            .map(|(cid, _)| *cid);

        match victim {
            Some(victim) => Activation::Evict(victim),
            None => {
                debug!(conversation = %id, priority, "activation rejected, pool full");
                Activation::Rejected
            }
        }
    }

    /// Record which conversation is open in the UI.  Does not allocate a
    /// slot; callers activate with [`waypoint_shared::constants::PRIORITY_CURRENT`]
    /// separately.
    ///
    /// The previous current slot is demoted to [`PRIORITY_RECENT`], so a
    /// pool full of formerly-current conversations can never starve the
    /// one the user is actually looking at.
    pub fn set_current(&mut self, id: ConversationId) {
        if let Some(prev) = self.current.filter(|prev| *prev != id) {
            if let Some(slot) = self.slots.get_mut(&prev) {
                slot.priority = slot.priority.min(PRIORITY_RECENT);
            }
        }
        self.current = Some(id);
    }

    pub fn current(&self) -> Option<ConversationId> {
        self.current
    }

    /// Mark a slot for teardown.  The manager closes it when the grace
    /// timer fires, unless the slot was re-promoted meanwhile.
    pub fn begin_eviction(&mut self, id: ConversationId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.evicting = true;
        }
    }

    pub fn is_evicting(&self, id: ConversationId) -> bool {
        self.slots.get(&id).map(|s| s.evicting).unwrap_or(false)
    }

    pub fn mark_connected(&mut self, id: ConversationId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.state = SlotState::Connected;
            slot.attempts = 0;
            slot.last_activity = Instant::now();
        }
    }

    pub fn note_activity(&mut self, id: ConversationId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.last_activity = Instant::now();
        }
    }

    /// Record a connection failure for an active slot.
    ///
    /// Returns `None` for unknown slots (stale events after teardown).
    pub fn on_failure(&mut self, id: ConversationId) -> Option<ReconnectDecision> {
        let slot = self.slots.get_mut(&id)?;

        if slot.reconnect_pending {
            return Some(ReconnectDecision::AlreadyPending);
        }

        slot.attempts += 1;
        slot.state = SlotState::Error;

        if slot.attempts >= self.max_attempts {
            debug!(conversation = %id, attempts = slot.attempts, "reconnect attempts exhausted, dropping slot");
            self.slots.remove(&id);
            return Some(ReconnectDecision::Drop);
        }

        slot.reconnect_pending = true;
        Some(ReconnectDecision::Schedule {
            attempt: slot.attempts - 1,
        })
    }

    /// Consume a fired reconnect timer: clears the pending flag and moves
    /// the slot back to `Connecting`.  Returns `false` when the slot no
    /// longer exists.
    pub fn begin_reconnect(&mut self, id: ConversationId) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) => {
                slot.reconnect_pending = false;
                slot.state = SlotState::Connecting;
                true
            }
            None => false,
        }
    }

    /// Remove a slot entirely.  Returns `true` if it existed.
    pub fn remove(&mut self, id: ConversationId) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Drop every slot, returning the ids that were open.
    pub fn clear(&mut self) -> Vec<ConversationId> {
        self.current = None;
        self.slots.drain().map(|(id, _)| id).collect()
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn state_of(&self, id: ConversationId) -> Option<SlotState> {
        self.slots.get(&id).map(|s| s.state)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn connected_ids(&self) -> Vec<ConversationId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.state == SlotState::Connected)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Snapshot of every slot and its state.
    pub fn snapshot(&self) -> Vec<(ConversationId, SlotState)> {
        self.slots.iter().map(|(id, s)| (*id, s.state)).collect()
    }
}
