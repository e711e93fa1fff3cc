//! Presence roster: the set of currently online users.
//!
//! Fed by a wholesale snapshot on (re)connect and incremental join/leave
//! events afterwards. Mutators report whether the roster actually changed
//! so the engine only emits change events for real transitions.

use std::collections::HashSet;

use chatsync_proto::message::UserId;

/// Tracks which users are currently online.
#[derive(Debug, Default)]
pub struct PresenceRoster {
    online: HashSet<UserId>,
}

impl PresenceRoster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the roster wholesale with a snapshot. Returns `true` if
    /// the online set changed.
    pub fn replace(&mut self, snapshot: Vec<UserId>) -> bool {
        let fresh: HashSet<UserId> = snapshot.into_iter().collect();
        if fresh == self.online {
            return false;
        }
        self.online = fresh;
        true
    }

    /// Marks a user online. Returns `true` if they were offline before.
    pub fn join(&mut self, user_id: UserId) -> bool {
        self.online.insert(user_id)
    }

    /// Marks a user offline. Returns `true` if they were online before.
    pub fn leave(&mut self, user_id: &UserId) -> bool {
        self.online.remove(user_id)
    }

    /// Whether the given user is currently online.
    #[must_use]
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.online.contains(user_id)
    }

    /// The current online set.
    #[must_use]
    pub const fn online(&self) -> &HashSet<UserId> {
        &self.online
    }
}
