//! Channel and resource-API abstractions.
//!
//! Defines the [`Channel`] trait — the bidirectional transport seam the
//! engine consumes (push events in, request/response calls out) — and the
//! [`ResourceApi`] trait for conventional request/response fetches
//! (conversation list, user directory, attachment upload, reaction
//! backfill). Concrete implementations:
//! - [`loopback::LoopbackChannel`] / [`loopback::InMemoryApi`] — in-process
//!   doubles for testing, driven by a scripted server handle.

pub mod loopback;

use chatsync_proto::attachment::{AttachmentPayload, StoredFile};
use chatsync_proto::conversation::{Conversation, Participant};
use chatsync_proto::event::PushEvent;
use chatsync_proto::message::{ConversationId, ForwardRef, MessageId};

use crate::reactions::ConversationReactions;

/// Errors surfaced by channel calls.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The connection to the server has been closed.
    #[error("channel closed")]
    Closed,

    /// The call timed out before a response arrived.
    #[error("channel request timed out")]
    Timeout,

    /// The server rejected an action the client believed valid.
    #[error("rejected by server: {0}")]
    Rejected(String),
}

impl ChannelError {
    /// Returns `true` when the server explicitly rejected the action, as
    /// opposed to the channel being unreachable.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Errors surfaced by resource fetches.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend is unreachable or returned a transport-level failure.
    #[error("resource API unavailable: {0}")]
    Unavailable(String),

    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),
}

/// Bidirectional event channel between the engine and the server.
///
/// Implementations deliver push events in arrival order per conversation.
/// Delivery is at-least-once: the same acknowledgement or broadcast may
/// arrive more than once, and the engine's reconciliation is designed for
/// that.
pub trait Channel: Send + Sync {
    /// Dispatch a send request; the server replies with the canonical
    /// message record, echoing `client_ref` so matching is exact.
    fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: String,
        attachment: Option<StoredFile>,
        client_ref: MessageId,
        forwarded_from: Option<ForwardRef>,
    ) -> impl std::future::Future<Output = Result<chatsync_proto::message::Message, ChannelError>> + Send;

    /// Apply a reaction to a message.
    fn add_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Withdraw a reaction from a message.
    fn remove_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Soft-delete a message.
    fn delete_message(
        &self,
        message_id: &MessageId,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Notify the server that the conversation has been read.
    fn mark_as_read(
        &self,
        conversation_id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Signal that the local user started or stopped typing.
    ///
    /// Fire-and-forget: implementations should not retry, and callers must
    /// not treat a failure as fatal.
    fn send_typing(
        &self,
        conversation_id: &ConversationId,
        is_typing: bool,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Receive the next push event. Blocks asynchronously until one arrives.
    fn next_event(
        &self,
    ) -> impl std::future::Future<Output = Result<PushEvent, ChannelError>> + Send;
}

/// Conventional request/response resource API for historical/bulk fetches.
pub trait ResourceApi: Send + Sync {
    /// List the current user's conversations, message logs included.
    fn list_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, ApiError>> + Send;

    /// Fetch a single conversation by id.
    fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<Conversation, ApiError>> + Send;

    /// List all addressable users.
    fn list_users(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Participant>, ApiError>> + Send;

    /// Upload a binary attachment out-of-band, returning the
    /// stored-resource descriptor.
    fn upload(
        &self,
        payload: &AttachmentPayload,
    ) -> impl std::future::Future<Output = Result<StoredFile, ApiError>> + Send;

    /// Fetch the authoritative reaction state for every message of a
    /// conversation (backfill for a newly opened conversation).
    fn fetch_reactions(
        &self,
        id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<ConversationReactions, ApiError>> + Send;
}

// Shared handles work as APIs too; tests keep one side to steer fixtures
// while the engine owns the other.
impl<T: ResourceApi> ResourceApi for std::sync::Arc<T> {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.as_ref().list_conversations().await
    }

    async fn fetch_conversation(&self, id: &ConversationId) -> Result<Conversation, ApiError> {
        self.as_ref().fetch_conversation(id).await
    }

    async fn list_users(&self) -> Result<Vec<Participant>, ApiError> {
        self.as_ref().list_users().await
    }

    async fn upload(&self, payload: &AttachmentPayload) -> Result<StoredFile, ApiError> {
        self.as_ref().upload(payload).await
    }

    async fn fetch_reactions(&self, id: &ConversationId) -> Result<ConversationReactions, ApiError> {
        self.as_ref().fetch_reactions(id).await
    }
}
