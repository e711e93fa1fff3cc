//! Typing state machine for remote indicators and the local debounce.
//!
//! Deadlines are owned values computed from injected `Instant`s, swept by
//! an explicit `tick`. Nothing here spawns timers or touches the network;
//! the engine translates returned signals into channel calls.
//!
//! Remote indicators expire a fixed TTL after the latest start and a
//! message arrival supersedes them. The local side emits a start signal on
//! the first keystroke after idle and an end signal once the keyboard has
//! been quiet for the debounce window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chatsync_proto::message::{ConversationId, UserId};

/// A remote user currently shown as typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingPeer {
    /// The typing user.
    pub user_id: UserId,
    /// Their display name, for rendering.
    pub user_name: String,
    deadline: Instant,
}

/// Outcome of a [`TypingTracker::tick`] sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TypingTick {
    /// Conversations whose remote indicator set changed by expiry.
    pub expired: Vec<ConversationId>,
    /// Conversations whose local debounce lapsed; the engine signals
    /// "typing end" for each.
    pub ended: Vec<ConversationId>,
}

impl TypingTick {
    /// Whether the sweep produced any transitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.ended.is_empty()
    }
}

/// Tracks remote typing indicators and the local typing debounce.
#[derive(Debug)]
pub struct TypingTracker {
    ttl: Duration,
    debounce: Duration,
    remote: HashMap<ConversationId, Vec<TypingPeer>>,
    local: HashMap<ConversationId, Instant>,
}

impl TypingTracker {
    /// Creates a tracker with the given remote TTL and local debounce.
    #[must_use]
    pub fn new(ttl: Duration, debounce: Duration) -> Self {
        Self {
            ttl,
            debounce,
            remote: HashMap::new(),
            local: HashMap::new(),
        }
    }

    /// Records a remote typing start, renewing the deadline if the user is
    /// already shown. Returns `true` if the visible set changed.
    pub fn remote_start(
        &mut self,
        conversation_id: &ConversationId,
        user_id: UserId,
        user_name: &str,
        now: Instant,
    ) -> bool {
        let peers = self.remote.entry(conversation_id.clone()).or_default();
        let deadline = now + self.ttl;
        if let Some(peer) = peers.iter_mut().find(|p| p.user_id == user_id) {
            peer.deadline = deadline;
            return false;
        }
        peers.push(TypingPeer {
            user_id,
            user_name: user_name.to_string(),
            deadline,
        });
        true
    }

    /// Records an explicit remote typing end. Returns `true` if the
    /// visible set changed.
    pub fn remote_end(&mut self, conversation_id: &ConversationId, user_id: &UserId) -> bool {
        let Some(peers) = self.remote.get_mut(conversation_id) else {
            return false;
        };
        let before = peers.len();
        peers.retain(|p| p.user_id != *user_id);
        let changed = peers.len() < before;
        if peers.is_empty() {
            self.remote.remove(conversation_id);
        }
        changed
    }

    /// Drops all typing state for a conversation (a message arrival or
    /// send supersedes the indicator). Returns `true` if remote indicators
    /// were showing.
    pub fn clear_conversation(&mut self, conversation_id: &ConversationId) -> bool {
        self.local.remove(conversation_id);
        self.remote.remove(conversation_id).is_some()
    }

    /// Remote users currently shown as typing in the conversation.
    #[must_use]
    pub fn typing_in(&self, conversation_id: &ConversationId) -> &[TypingPeer] {
        self.remote
            .get(conversation_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Registers a local keystroke. Returns `true` when the idle→typing
    /// transition occurred and a start signal must be sent; every
    /// keystroke re-arms the debounce.
    pub fn local_keystroke(&mut self, conversation_id: &ConversationId, now: Instant) -> bool {
        let started = !self.local.contains_key(conversation_id);
        self.local
            .insert(conversation_id.clone(), now + self.debounce);
        started
    }

    /// Ends local typing immediately (the user sent the message). Returns
    /// `true` if an end signal must be sent.
    pub fn local_stop(&mut self, conversation_id: &ConversationId) -> bool {
        self.local.remove(conversation_id).is_some()
    }

    /// Sweeps expired remote indicators and lapsed local debounces.
    pub fn tick(&mut self, now: Instant) -> TypingTick {
        let mut outcome = TypingTick::default();

        self.remote.retain(|conversation_id, peers| {
            let before = peers.len();
            peers.retain(|p| p.deadline > now);
            if peers.len() < before {
                outcome.expired.push(conversation_id.clone());
            }
            !peers.is_empty()
        });

        self.local.retain(|conversation_id, deadline| {
            if *deadline <= now {
                outcome.ended.push(conversation_id.clone());
                false
            } else {
                true
            }
        });

        outcome
    }
}
