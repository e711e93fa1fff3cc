//! Reaction ledger: per-message mapping of reaction symbol to reacting
//! users, enforcing one active reaction per user per message.
//!
//! The ledger is mutated both optimistically (before the network round
//! trip) and by inbound broadcast events from other participants. Applying
//! a second symbol for the same user implicitly withdraws the first, a
//! client-side mirror of the server's exclusivity rule; replaying the
//! server's own removal event for that transition is a no-op.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use chatsync_proto::message::{MessageId, UserId};

/// A user who applied a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactor {
    /// The reacting user.
    pub user_id: UserId,
    /// Their display name, for rendering.
    pub user_name: String,
}

/// Reaction state of a single message: symbol to reacting users.
pub type ReactionMap = HashMap<String, Vec<Reactor>>;

/// Authoritative reaction state for every message of a conversation.
pub type ConversationReactions = HashMap<MessageId, ReactionMap>;

/// Tracks reactions for all known messages.
#[derive(Debug, Default)]
pub struct ReactionLedger {
    by_message: HashMap<MessageId, ReactionMap>,
}

impl ReactionLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `emoji` for `user_id` on the given message.
    ///
    /// Returns the symbol the user previously held on this message, if any
    /// — the caller is responsible for dispatching the matching implicit
    /// removal over the channel. Re-applying the symbol the user already
    /// holds is a no-op returning `None`.
    pub fn add(
        &mut self,
        message_id: &MessageId,
        emoji: &str,
        user_id: &UserId,
        user_name: &str,
    ) -> Option<String> {
        let previous = self.symbol_of(message_id, user_id).map(str::to_string);

        if previous.as_deref() == Some(emoji) {
            return None;
        }

        if let Some(old) = &previous {
            self.remove(message_id, old, user_id);
        }

        self.by_message
            .entry(message_id.clone())
            .or_default()
            .entry(emoji.to_string())
            .or_default()
            .push(Reactor {
                user_id: user_id.clone(),
                user_name: user_name.to_string(),
            });

        previous
    }

    /// Withdraws `emoji` for `user_id` on the given message.
    ///
    /// Idempotent: removing a reaction the user does not hold is a no-op.
    /// Returns `true` if an entry was actually removed. Empty symbol
    /// buckets are pruned from the map.
    pub fn remove(&mut self, message_id: &MessageId, emoji: &str, user_id: &UserId) -> bool {
        let Some(map) = self.by_message.get_mut(message_id) else {
            return false;
        };
        let Some(bucket) = map.get_mut(emoji) else {
            return false;
        };

        let before = bucket.len();
        bucket.retain(|r| r.user_id != *user_id);
        let removed = bucket.len() < before;

        if bucket.is_empty() {
            map.remove(emoji);
        }
        if map.is_empty() {
            self.by_message.remove(message_id);
        }
        removed
    }

    /// Replaces the reaction state of a single message wholesale with the
    /// authoritative server copy.
    pub fn backfill(&mut self, message_id: &MessageId, map: ReactionMap) {
        if map.is_empty() {
            self.by_message.remove(message_id);
        } else {
            self.by_message.insert(message_id.clone(), map);
        }
    }

    /// Replaces the reaction state of every listed message (bulk backfill
    /// for a newly opened conversation).
    pub fn backfill_conversation(&mut self, reactions: ConversationReactions) {
        for (message_id, map) in reactions {
            self.backfill(&message_id, map);
        }
    }

    /// Drops all reaction state for a message (e.g. after deletion).
    pub fn clear_message(&mut self, message_id: &MessageId) {
        self.by_message.remove(message_id);
    }

    /// Returns the reaction state of a message, if any reactions exist.
    #[must_use]
    pub fn reactions(&self, message_id: &MessageId) -> Option<&ReactionMap> {
        self.by_message.get(message_id)
    }

    /// Returns the symbol `user_id` currently holds on the message, if any.
    #[must_use]
    pub fn symbol_of(&self, message_id: &MessageId, user_id: &UserId) -> Option<&str> {
        let map = self.by_message.get(message_id)?;
        map.iter()
            .find(|(_, reactors)| reactors.iter().any(|r| r.user_id == *user_id))
            .map(|(emoji, _)| emoji.as_str())
    }
}
