//! Conversation and participant types.

use serde::{Deserialize, Serialize};

use crate::message::{ConversationId, Message, Timestamp, UserId};

/// Role of a participant within the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// A student account.
    Student,
    /// A teacher account.
    Teacher,
    /// An administrator account.
    Admin,
    /// Any other role string the server may introduce.
    Other(String),
}

/// One of the two parties of a private conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub display_name: String,
    /// Avatar URL, if the user has one.
    pub avatar_url: Option<String>,
    /// Platform role.
    pub role: Role,
}

/// A private conversation between exactly two participants.
///
/// The message log is stored newest-first and never contains two entries
/// for the same logical message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: ConversationId,
    /// The two participants.
    pub participants: Vec<Participant>,
    /// Snippet of the most recent message, used for list ordering/preview.
    pub last_message: Option<String>,
    /// Timestamp of the most recent message, used for list ordering.
    pub last_message_time: Option<Timestamp>,
    /// Message log, newest first.
    pub messages: Vec<Message>,
    /// Client-side derived unread flag (not persisted server-side).
    pub unread: bool,
}

impl Conversation {
    /// Creates an empty conversation between two participants.
    #[must_use]
    pub fn new(id: ConversationId, a: Participant, b: Participant) -> Self {
        Self {
            id,
            participants: vec![a, b],
            last_message: None,
            last_message_time: None,
            messages: Vec::new(),
            unread: false,
        }
    }

    /// Returns the participant other than `local`, if present.
    #[must_use]
    pub fn peer_of(&self, local: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id != *local)
    }

    /// Returns `true` if this conversation is between exactly the two
    /// given users, in either order.
    #[must_use]
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        self.participants.len() == 2
            && self.participants.iter().any(|p| p.id == *a)
            && self.participants.iter().any(|p| p.id == *b)
    }
}
