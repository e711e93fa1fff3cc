//! Unread tracking, derived client-side.
//!
//! The server stores no per-conversation read markers; the client flags a
//! conversation unread when a message arrives for a conversation that is
//! not currently active, and clears the flag on read-like interactions.
//! Clearing reports `true` exactly once per unread episode so the engine
//! sends exactly one mark-as-read call per clear.

use std::collections::HashSet;

use chatsync_proto::message::{ConversationId, UserId};

/// Tracks which conversations are unread and which one is active.
#[derive(Debug)]
pub struct UnreadTracker {
    local_user: UserId,
    unread: HashSet<ConversationId>,
    active: Option<ConversationId>,
}

impl UnreadTracker {
    /// Creates a tracker for the given local user with nothing unread.
    #[must_use]
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            unread: HashSet::new(),
            active: None,
        }
    }

    /// Sets (or clears) the active conversation. Activation alone does not
    /// clear the unread flag; the engine clears explicitly when opening.
    pub fn set_active(&mut self, conversation_id: Option<ConversationId>) {
        self.active = conversation_id;
    }

    /// The currently active conversation, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// Whether `conversation_id` is the active conversation.
    #[must_use]
    pub fn is_active(&self, conversation_id: &ConversationId) -> bool {
        self.active.as_ref() == Some(conversation_id)
    }

    /// Applies an inbound message: flags the conversation unread when it
    /// is not active and the sender is not the local user. Returns `true`
    /// if the flag was newly raised.
    pub fn on_inbound(&mut self, conversation_id: &ConversationId, sender_id: &UserId) -> bool {
        if *sender_id == self.local_user || self.is_active(conversation_id) {
            return false;
        }
        self.unread.insert(conversation_id.clone())
    }

    /// Clears the unread flag. Returns `true` exactly once per episode;
    /// repeated clears are no-ops.
    pub fn clear(&mut self, conversation_id: &ConversationId) -> bool {
        self.unread.remove(conversation_id)
    }

    /// Whether the conversation is currently flagged unread.
    #[must_use]
    pub fn is_unread(&self, conversation_id: &ConversationId) -> bool {
        self.unread.contains(conversation_id)
    }
}
