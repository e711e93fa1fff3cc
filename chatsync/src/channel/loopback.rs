//! In-process channel and resource-API doubles for testing.
//!
//! [`LoopbackChannel::create`] returns a connected channel plus a
//! [`ServerHandle`] that scripts the server side: it records every request
//! the engine dispatches, assigns canonical message ids, optionally echoes
//! a `MessageCreated` broadcast for each send, and lets tests inject
//! arbitrary push events and failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use chatsync_proto::attachment::{AttachmentPayload, StoredFile};
use chatsync_proto::conversation::{Conversation, Participant};
use chatsync_proto::event::{ChannelRequest, PushEvent};
use chatsync_proto::message::{
    ConversationId, ForwardRef, Message, MessageId, MessageStatus, Timestamp, UserId,
};

use crate::reactions::ConversationReactions;

use super::{ApiError, Channel, ChannelError, ResourceApi};

/// Shared state between the channel endpoint and its scripting handle.
struct ServerState {
    /// Identity the scripted server attributes sends to.
    local_id: UserId,
    /// Display name for that identity.
    local_name: String,
    /// Monotonic counter for canonical message ids.
    next_id: AtomicU64,
    /// When set, every call fails with [`ChannelError::Closed`].
    offline: AtomicBool,
    /// When set, the server broadcasts the canonical record of each send.
    echo_broadcast: AtomicBool,
    /// One-shot rejection consumed by the next request.
    reject_next: Mutex<Option<String>>,
    /// Every request the engine dispatched, in order.
    requests: Mutex<Vec<ChannelRequest>>,
    /// Push-event injection side (same queue the channel reads from).
    event_tx: mpsc::Sender<PushEvent>,
}

impl ServerState {
    fn check_reachable(&self) -> Result<(), ChannelError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        if let Some(reason) = self.reject_next.lock().take() {
            return Err(ChannelError::Rejected(reason));
        }
        Ok(())
    }

    fn record(&self, request: ChannelRequest) {
        self.requests.lock().push(request);
    }
}

/// In-process [`Channel`] backed by a `tokio::sync::mpsc` event queue and
/// a scripted server.
pub struct LoopbackChannel {
    state: Arc<ServerState>,
    events: AsyncMutex<mpsc::Receiver<PushEvent>>,
}

/// Test-side handle scripting the server behind a [`LoopbackChannel`].
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
}

impl LoopbackChannel {
    /// Creates a connected channel/handle pair.
    ///
    /// `local_id`/`local_name` is the identity the server attributes sends
    /// to; `buffer` is the push-event queue capacity.
    pub fn create(
        local_id: UserId,
        local_name: impl Into<String>,
        buffer: usize,
    ) -> (Self, ServerHandle) {
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let state = Arc::new(ServerState {
            local_id,
            local_name: local_name.into(),
            next_id: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            echo_broadcast: AtomicBool::new(false),
            reject_next: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            event_tx,
        });
        let channel = Self {
            state: Arc::clone(&state),
            events: AsyncMutex::new(event_rx),
        };
        (channel, ServerHandle { state })
    }
}

impl ServerHandle {
    /// Injects a push event into the channel's queue.
    pub async fn push(&self, event: PushEvent) {
        // Queue closure only happens when the channel endpoint is dropped.
        let _ = self.state.event_tx.send(event).await;
    }

    /// Returns every request dispatched so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChannelRequest> {
        self.state.requests.lock().clone()
    }

    /// Drops the recorded request log.
    pub fn clear_requests(&self) {
        self.state.requests.lock().clear();
    }

    /// Simulates the channel going down: every call fails with
    /// [`ChannelError::Closed`] until re-enabled.
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes the next request fail with [`ChannelError::Rejected`].
    pub fn reject_next(&self, reason: impl Into<String>) {
        *self.state.reject_next.lock() = Some(reason.into());
    }

    /// When enabled, each acknowledged send is also broadcast back as a
    /// `MessageCreated` event carrying the correlation reference, the way
    /// the real server fans a send out to both participants.
    pub fn set_echo_broadcast(&self, echo: bool) {
        self.state.echo_broadcast.store(echo, Ordering::SeqCst);
    }

    /// Identifier the next acknowledged send will receive.
    #[must_use]
    pub fn peek_next_id(&self) -> String {
        format!("m{}", self.state.next_id.load(Ordering::SeqCst))
    }
}

impl Channel for LoopbackChannel {
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: String,
        attachment: Option<StoredFile>,
        client_ref: MessageId,
        forwarded_from: Option<ForwardRef>,
    ) -> Result<Message, ChannelError> {
        self.state.check_reachable()?;
        self.state.record(ChannelRequest::SendMessage {
            conversation_id: conversation_id.clone(),
            text: text.clone(),
            attachment: attachment.clone(),
            client_ref: client_ref.clone(),
            forwarded_from: forwarded_from.clone(),
        });

        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id: MessageId::new(format!("m{n}")),
            conversation_id: conversation_id.clone(),
            sender_id: self.state.local_id.clone(),
            sender_name: self.state.local_name.clone(),
            text,
            attachment: attachment.map(StoredFile::into_attachment),
            sent_at: Timestamp::now(),
            status: MessageStatus::Sent,
            forwarded_from,
        };

        if self.state.echo_broadcast.load(Ordering::SeqCst) {
            let _ = self
                .state
                .event_tx
                .send(PushEvent::MessageCreated {
                    message: message.clone(),
                    correlation: Some(client_ref),
                })
                .await;
        }

        Ok(message)
    }

    async fn add_reaction(&self, message_id: &MessageId, emoji: &str) -> Result<(), ChannelError> {
        self.state.check_reachable()?;
        self.state.record(ChannelRequest::AddReaction {
            message_id: message_id.clone(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        self.state.check_reachable()?;
        self.state.record(ChannelRequest::RemoveReaction {
            message_id: message_id.clone(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message_id: &MessageId) -> Result<(), ChannelError> {
        self.state.check_reachable()?;
        self.state.record(ChannelRequest::DeleteMessage {
            message_id: message_id.clone(),
        });
        Ok(())
    }

    async fn mark_as_read(&self, conversation_id: &ConversationId) -> Result<(), ChannelError> {
        self.state.check_reachable()?;
        self.state.record(ChannelRequest::MarkAsRead {
            conversation_id: conversation_id.clone(),
        });
        Ok(())
    }

    async fn send_typing(
        &self,
        conversation_id: &ConversationId,
        is_typing: bool,
    ) -> Result<(), ChannelError> {
        self.state.check_reachable()?;
        self.state.record(ChannelRequest::Typing {
            conversation_id: conversation_id.clone(),
            is_typing,
        });
        Ok(())
    }

    async fn next_event(&self) -> Result<PushEvent, ChannelError> {
        let mut rx = self.events.lock().await;
        rx.recv().await.ok_or(ChannelError::Closed)
    }
}

/// In-memory [`ResourceApi`] double with seedable fixtures.
#[derive(Default)]
pub struct InMemoryApi {
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
    users: Mutex<Vec<Participant>>,
    reactions: Mutex<HashMap<ConversationId, ConversationReactions>>,
    upload_counter: AtomicU64,
    fail_uploads: AtomicBool,
    unavailable: AtomicBool,
}

impl InMemoryApi {
    /// Creates an empty API double.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds (or replaces) a conversation fixture.
    pub fn put_conversation(&self, conversation: Conversation) {
        self.conversations
            .lock()
            .insert(conversation.id.clone(), conversation);
    }

    /// Seeds the addressable-user directory.
    pub fn set_users(&self, users: Vec<Participant>) {
        *self.users.lock() = users;
    }

    /// Seeds the authoritative reaction state of a conversation.
    pub fn set_reactions(&self, id: ConversationId, reactions: ConversationReactions) {
        self.reactions.lock().insert(id, reactions);
    }

    /// Makes subsequent uploads fail with [`ApiError::Unavailable`].
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Makes every call fail with [`ApiError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), ApiError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("backend offline".into()));
        }
        Ok(())
    }
}

impl ResourceApi for InMemoryApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.check_reachable()?;
        Ok(self.conversations.lock().values().cloned().collect())
    }

    async fn fetch_conversation(&self, id: &ConversationId) -> Result<Conversation, ApiError> {
        self.check_reachable()?;
        self.conversations
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    async fn list_users(&self) -> Result<Vec<Participant>, ApiError> {
        self.check_reachable()?;
        Ok(self.users.lock().clone())
    }

    async fn upload(&self, payload: &AttachmentPayload) -> Result<StoredFile, ApiError> {
        self.check_reachable()?;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("upload failed".into()));
        }
        let n = self.upload_counter.fetch_add(1, Ordering::SeqCst);
        Ok(StoredFile {
            file_name: payload.file_name.clone(),
            file_path: format!("/files/{n}/{}", payload.file_name),
            file_size: payload.bytes.len() as u64,
            mime_type: payload.mime_type.clone(),
            is_image: payload.is_image(),
        })
    }

    async fn fetch_reactions(&self, id: &ConversationId) -> Result<ConversationReactions, ApiError> {
        self.check_reachable()?;
        Ok(self.reactions.lock().get(id).cloned().unwrap_or_default())
    }
}
