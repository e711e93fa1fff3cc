//! Push events delivered by the channel and the request calls the engine
//! issues back over it.
//!
//! Payload fields are the semantic minimum of each category; the exact
//! wire shape belongs to the channel implementation, not the engine.

use serde::{Deserialize, Serialize};

use crate::attachment::StoredFile;
use crate::message::{ConversationId, ForwardRef, Message, MessageId, UserId};

/// Inbound push event folded into engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushEvent {
    /// Full online-id set, replacing the presence roster wholesale.
    PresenceSnapshot {
        /// Identifiers of all currently connected users.
        online: Vec<UserId>,
    },
    /// A single user connected.
    PresenceJoin {
        /// The user that came online.
        user_id: UserId,
    },
    /// A single user disconnected.
    PresenceLeave {
        /// The user that went offline.
        user_id: UserId,
    },
    /// A canonical message record, broadcast to both participants.
    MessageCreated {
        /// The full canonical message.
        message: Message,
        /// Provisional identifier echoed back when the server received one
        /// with the originating send. Broadcasts originating on another
        /// device or participant may omit it.
        correlation: Option<MessageId>,
    },
    /// A message was soft-deleted.
    MessageDeleted {
        /// The deleted message.
        message_id: MessageId,
        /// The conversation holding it.
        conversation_id: ConversationId,
    },
    /// A reaction was applied to a message.
    ReactionAdded {
        /// Target message.
        message_id: MessageId,
        /// Reaction symbol.
        emoji: String,
        /// Reacting user.
        user_id: UserId,
        /// Reacting user's display name.
        user_name: String,
    },
    /// A reaction was withdrawn from a message.
    ReactionRemoved {
        /// Target message.
        message_id: MessageId,
        /// Reaction symbol.
        emoji: String,
        /// User whose reaction was withdrawn.
        user_id: UserId,
    },
    /// A peer started typing in a conversation.
    TypingStart {
        /// Conversation where typing occurs.
        conversation_id: ConversationId,
        /// The typing user.
        user_id: UserId,
        /// The typing user's display name.
        user_name: String,
    },
    /// A peer stopped typing in a conversation.
    TypingEnd {
        /// Conversation where typing stopped.
        conversation_id: ConversationId,
        /// The user that stopped typing.
        user_id: UserId,
    },
    /// A user viewed a conversation's messages.
    ReadReceipt {
        /// The conversation that was read.
        conversation_id: ConversationId,
        /// The reader.
        reader_id: UserId,
    },
}

/// Request issued by the engine over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelRequest {
    /// Send a message; the server replies with the canonical record.
    SendMessage {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Text content.
        text: String,
        /// Resolved attachment descriptor, uploaded out-of-band first.
        attachment: Option<StoredFile>,
        /// Client-generated provisional identifier, echoed back in the
        /// acknowledgement and broadcast so matching is exact.
        client_ref: MessageId,
        /// Forwarding annotation, if any.
        forwarded_from: Option<ForwardRef>,
    },
    /// Apply a reaction.
    AddReaction {
        /// Target message.
        message_id: MessageId,
        /// Reaction symbol.
        emoji: String,
    },
    /// Withdraw a reaction.
    RemoveReaction {
        /// Target message.
        message_id: MessageId,
        /// Reaction symbol.
        emoji: String,
    },
    /// Soft-delete a message.
    DeleteMessage {
        /// Target message.
        message_id: MessageId,
    },
    /// Clear the unread state of a conversation and notify the peer.
    MarkAsRead {
        /// The conversation that was read.
        conversation_id: ConversationId,
    },
    /// Fire-and-forget typing signal for the local user.
    Typing {
        /// Conversation the user is typing in.
        conversation_id: ConversationId,
        /// `true` on typing start, `false` on typing end.
        is_typing: bool,
    },
}
