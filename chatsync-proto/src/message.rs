//! Message entities and identifiers for the `ChatSync` data model.
//!
//! A [`Message`] starts its life client-side with a *provisional*
//! identifier (`temp_<uuid>`) and [`MessageStatus::Pending`], and is
//! replaced in place by the canonical server record during reconciliation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::Attachment;

/// Default ceiling on message text length in bytes.
pub const DEFAULT_MAX_TEXT_LEN: usize = 4096;

/// Placeholder shown in place of the content of a deleted message.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

/// Prefix marking a client-generated provisional message identifier.
const PROVISIONAL_PREFIX: &str = "temp_";

/// Identifier of a message.
///
/// Server-assigned identifiers are opaque strings, stable once the message
/// has been acknowledged. Before acknowledgement the client uses a
/// provisional identifier created by [`MessageId::provisional`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wraps an existing (server-assigned) identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh provisional identifier (`temp_<uuid-v7>`).
    #[must_use]
    pub fn provisional() -> Self {
        Self(format!("{PROVISIONAL_PREFIX}{}", Uuid::now_v7()))
    }

    /// Returns `true` if this identifier was generated locally and has not
    /// been replaced by a canonical one.
    #[must_use]
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    /// Returns the string representation of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user (participant, sender, or reader).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wraps an existing user identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wraps an existing conversation identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier for a locally started chat (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the string representation of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Millisecond-precision UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Lifecycle status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Inserted optimistically, awaiting server acknowledgement.
    Pending,
    /// Acknowledged or broadcast by the server; identifier is canonical.
    Sent,
    /// Send or upload failed; stays visible until the user retries.
    Failed,
    /// Soft-deleted; displayed content replaced by a placeholder.
    Deleted,
}

/// Non-owning back-reference carried by a forwarded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRef {
    /// Identifier of the message that was forwarded.
    pub message_id: MessageId,
    /// Display name of the original sender.
    pub original_sender: String,
}

/// Error returned when a message fails validation before sending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Message has no text and no attachment.
    #[error("message has no content")]
    Empty,
    /// Message text exceeds the configured ceiling.
    #[error("message too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual size of the text in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// A single message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Canonical or provisional identifier.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Identifier of the sender.
    pub sender_id: UserId,
    /// Display name of the sender.
    pub sender_name: String,
    /// Text content. Replaced by [`DELETED_PLACEHOLDER`] on deletion.
    pub text: String,
    /// Optional attachment, owned exclusively by this message.
    pub attachment: Option<Attachment>,
    /// When the message was sent (server-assigned once canonical).
    pub sent_at: Timestamp,
    /// Lifecycle status.
    pub status: MessageStatus,
    /// Back-reference carried when this message was forwarded.
    pub forwarded_from: Option<ForwardRef>,
}

impl Message {
    /// Builds a pending message with a provisional identifier, ready for
    /// optimistic insertion into a conversation log.
    #[must_use]
    pub fn pending(
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_name: impl Into<String>,
        text: impl Into<String>,
        attachment: Option<Attachment>,
        forwarded_from: Option<ForwardRef>,
    ) -> Self {
        Self {
            id: MessageId::provisional(),
            conversation_id,
            sender_id,
            sender_name: sender_name.into(),
            text: text.into(),
            attachment,
            sent_at: Timestamp::now(),
            status: MessageStatus::Pending,
            forwarded_from,
        }
    }

    /// Validates this message before sending.
    ///
    /// A message must carry text or an attachment, and its text must not
    /// exceed `max_text_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] when both text and attachment are
    /// absent, or [`ValidationError::TooLarge`] when the text exceeds the
    /// ceiling.
    pub fn validate(&self, max_text_len: usize) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() && self.attachment.is_none() {
            return Err(ValidationError::Empty);
        }
        if self.text.len() > max_text_len {
            return Err(ValidationError::TooLarge {
                size: self.text.len(),
                max: max_text_len,
            });
        }
        Ok(())
    }

    /// Soft-deletes this message: the displayed content becomes the fixed
    /// placeholder while attachment metadata is kept internally (needed to
    /// clean up stored files) and hidden from rendering.
    pub fn mark_deleted(&mut self) {
        self.status = MessageStatus::Deleted;
        self.text = DELETED_PLACEHOLDER.to_string();
    }

    /// Attachment as the rendering layer should see it: hidden once the
    /// message has been deleted.
    #[must_use]
    pub const fn visible_attachment(&self) -> Option<&Attachment> {
        match self.status {
            MessageStatus::Deleted => None,
            _ => self.attachment.as_ref(),
        }
    }
}
