//! The synchronization engine: owns every piece of client chat state and
//! keeps it converged with the server.
//!
//! [`SyncEngine`] is generic over the [`Channel`] (live push/request
//! transport) and the [`ResourceApi`] (bulk fetches and uploads). All
//! mutation is synchronous and single-threaded through `&mut self`; async
//! appears only at the two network seams. State changes are surfaced to
//! the rendering layer as [`EngineEvent`]s over a bounded mpsc channel.

mod events;
mod send;

pub use events::EngineEvent;
pub use send::SendError;

use std::time::Instant;

use tokio::sync::mpsc;

use chatsync_proto::conversation::{Conversation, Participant};
use chatsync_proto::message::{ConversationId, Message, MessageId, UserId};

use crate::channel::{ApiError, Channel, ResourceApi};
use crate::config::EngineConfig;
use crate::presence::PresenceRoster;
use crate::reactions::{ReactionLedger, ReactionMap};
use crate::store::ConversationStore;
use crate::typing::{TypingPeer, TypingTracker};
use crate::unread::UnreadTracker;
use crate::upload::Uploader;

/// Client-side chat state machine, converging on server state.
pub struct SyncEngine<C: Channel, A: ResourceApi> {
    channel: C,
    api: A,
    config: EngineConfig,
    local: Participant,
    store: ConversationStore,
    reactions: ReactionLedger,
    typing: TypingTracker,
    presence: PresenceRoster,
    unread: UnreadTracker,
    uploader: Uploader,
    events: mpsc::Sender<EngineEvent>,
}

impl<C: Channel, A: ResourceApi> SyncEngine<C, A> {
    /// Creates an engine and the receiving end of its event stream.
    ///
    /// The engine starts empty; call [`resync`](Self::resync) to populate
    /// it from the server.
    pub fn new(
        channel: C,
        api: A,
        local: Participant,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(config.event_buffer);
        let engine = Self {
            channel,
            api,
            local: local.clone(),
            store: ConversationStore::new(local.id.clone()),
            reactions: ReactionLedger::new(),
            typing: TypingTracker::new(config.typing_ttl, config.typing_debounce),
            presence: PresenceRoster::new(),
            unread: UnreadTracker::new(local.id),
            uploader: Uploader::new(config.max_attachment_bytes),
            config,
            events: tx,
        };
        (engine, rx)
    }

    /// Best-effort event emission; a full queue drops the event with a
    /// warning rather than blocking the engine.
    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.events.try_send(event) {
            tracing::warn!(error = %e, "dropping engine event");
        }
    }

    /// Fetches the full conversation list and merges it over local state,
    /// preserving still-pending sends. Typing indicators are discarded;
    /// the next presence snapshot rebuilds the roster.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the list fetch fails; local state is left
    /// untouched in that case.
    pub async fn resync(&mut self) -> Result<(), ApiError> {
        let fresh = self.api.list_conversations().await?;
        tracing::info!(conversations = fresh.len(), "resyncing from snapshot");
        self.store.merge_snapshot(fresh);
        self.typing = TypingTracker::new(self.config.typing_ttl, self.config.typing_debounce);
        self.emit(EngineEvent::ConversationsChanged);
        Ok(())
    }

    /// Opens a conversation: makes it active, clears its unread flag, and
    /// backfills authoritative reaction state for its messages.
    pub async fn open_conversation(&mut self, conversation_id: &ConversationId) {
        if self.store.conversation(conversation_id).is_none() {
            tracing::warn!(conversation = %conversation_id, "opening unknown conversation");
            return;
        }
        self.unread.set_active(Some(conversation_id.clone()));
        self.clear_unread(conversation_id).await;

        match self.api.fetch_reactions(conversation_id).await {
            Ok(reactions) => {
                let touched: Vec<MessageId> = reactions.keys().cloned().collect();
                self.reactions.backfill_conversation(reactions);
                for message_id in touched {
                    self.emit(EngineEvent::ReactionsChanged { message_id });
                }
            }
            Err(e) => {
                tracing::warn!(
                    conversation = %conversation_id,
                    error = %e,
                    "reaction backfill failed"
                );
            }
        }
    }

    /// Leaves the active conversation.
    pub fn close_conversation(&mut self) {
        self.unread.set_active(None);
    }

    /// Read-like interaction (scroll, click, focus) inside a conversation;
    /// clears the unread flag when it targets the active conversation.
    pub async fn interaction(&mut self, conversation_id: &ConversationId) {
        if self.unread.is_active(conversation_id) {
            self.clear_unread(conversation_id).await;
        }
    }

    /// Applies the local user's reaction optimistically, then dispatches.
    ///
    /// Switching symbols dispatches the implicit removal of the previous
    /// one first. A server rejection discards the optimistic change by
    /// backfilling authoritative state.
    pub async fn add_reaction(&mut self, message_id: &MessageId, emoji: &str) {
        if self.reactions.symbol_of(message_id, &self.local.id) == Some(emoji) {
            return;
        }
        let previous =
            self.reactions
                .add(message_id, emoji, &self.local.id, &self.local.display_name);
        self.emit(EngineEvent::ReactionsChanged {
            message_id: message_id.clone(),
        });

        if let Some(old) = previous
            && let Err(e) = self.channel.remove_reaction(message_id, &old).await
        {
            if e.is_conflict() {
                self.backfill_reactions(message_id).await;
                return;
            }
            tracing::warn!(message_id = %message_id, error = %e, "implicit removal failed");
        }

        match self.channel.add_reaction(message_id, emoji).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => self.backfill_reactions(message_id).await,
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "add reaction failed");
            }
        }
    }

    /// Withdraws the local user's reaction optimistically, then dispatches.
    pub async fn remove_reaction(&mut self, message_id: &MessageId, emoji: &str) {
        if !self.reactions.remove(message_id, emoji, &self.local.id) {
            return;
        }
        self.emit(EngineEvent::ReactionsChanged {
            message_id: message_id.clone(),
        });

        match self.channel.remove_reaction(message_id, emoji).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => self.backfill_reactions(message_id).await,
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "remove reaction failed");
            }
        }
    }

    /// Replaces local reaction state for the message's conversation with
    /// the server's authoritative copy.
    async fn backfill_reactions(&mut self, message_id: &MessageId) {
        let Some(conversation_id) = self
            .store
            .message(message_id)
            .map(|m| m.conversation_id.clone())
        else {
            tracing::warn!(message_id = %message_id, "cannot backfill reactions of unknown message");
            return;
        };
        match self.api.fetch_reactions(&conversation_id).await {
            Ok(mut authoritative) => {
                // The rejected message may be absent from the reply, which
                // means it has no reactions at all.
                let target = authoritative.remove(message_id).unwrap_or_default();
                self.reactions.backfill(message_id, target);
                let touched: Vec<MessageId> = authoritative.keys().cloned().collect();
                self.reactions.backfill_conversation(authoritative);
                self.emit(EngineEvent::ReactionsChanged {
                    message_id: message_id.clone(),
                });
                for touched_id in touched {
                    self.emit(EngineEvent::ReactionsChanged {
                        message_id: touched_id,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(
                    conversation = %conversation_id,
                    error = %e,
                    "reaction backfill failed"
                );
            }
        }
    }

    /// Soft-deletes a message optimistically, then dispatches. A server
    /// rejection restores authoritative state by re-fetching the
    /// conversation.
    pub async fn delete_message(&mut self, message_id: &MessageId) {
        let Some(conversation_id) = self.store.mark_deleted(message_id) else {
            return;
        };
        self.reactions.clear_message(message_id);
        self.emit(EngineEvent::MessageDeleted {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
        });
        self.emit(EngineEvent::ConversationsChanged);

        match self.channel.delete_message(message_id).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                tracing::warn!(message_id = %message_id, error = %e, "delete rejected, re-fetching");
                if let Ok(conversation) = self.api.fetch_conversation(&conversation_id).await {
                    self.store.upsert_conversation(conversation);
                    self.emit(EngineEvent::ConversationsChanged);
                }
            }
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "delete dispatch failed");
            }
        }
    }

    /// Registers a local keystroke in a conversation, signalling typing
    /// start on the idle-to-typing transition.
    pub async fn local_keystroke(&mut self, conversation_id: &ConversationId) {
        self.local_keystroke_at(conversation_id, Instant::now())
            .await;
    }

    /// [`local_keystroke`](Self::local_keystroke) with an injected clock.
    pub async fn local_keystroke_at(&mut self, conversation_id: &ConversationId, now: Instant) {
        if self.typing.local_keystroke(conversation_id, now) {
            self.signal_typing(conversation_id, true).await;
        }
    }

    /// Advances the typing clock: expires remote indicators and ends the
    /// local typing state once the keyboard has gone quiet.
    pub async fn tick(&mut self) {
        self.tick_at(Instant::now()).await;
    }

    /// [`tick`](Self::tick) with an injected clock.
    pub async fn tick_at(&mut self, now: Instant) {
        let sweep = self.typing.tick(now);
        for conversation_id in sweep.expired {
            self.emit(EngineEvent::TypingChanged { conversation_id });
        }
        for conversation_id in sweep.ended {
            self.signal_typing(&conversation_id, false).await;
        }
    }

    /// Fire-and-forget typing signal; failures are logged, never surfaced.
    async fn signal_typing(&mut self, conversation_id: &ConversationId, is_typing: bool) {
        if let Err(e) = self.channel.send_typing(conversation_id, is_typing).await {
            tracing::debug!(
                conversation = %conversation_id,
                is_typing,
                error = %e,
                "typing signal dropped"
            );
        }
    }

    /// Finds or creates the conversation with `peer`. Idempotent per
    /// participant pair.
    pub fn start_chat(&mut self, peer: Participant) -> ConversationId {
        if let Some(existing) = self.store.conversation_with(&peer.id) {
            return existing.id.clone();
        }
        let id = self.store.find_or_create_with(self.local.clone(), peer);
        self.emit(EngineEvent::ConversationsChanged);
        id
    }

    /// Clears the unread flag, emitting one mark-as-read call per clear.
    async fn clear_unread(&mut self, conversation_id: &ConversationId) {
        if !self.unread.clear(conversation_id) {
            return;
        }
        self.store.set_unread(conversation_id, false);
        self.emit(EngineEvent::UnreadChanged {
            conversation_id: conversation_id.clone(),
            unread: false,
        });
        if let Err(e) = self.channel.mark_as_read(conversation_id).await {
            tracing::warn!(conversation = %conversation_id, error = %e, "mark-as-read failed");
        }
    }

    /// Lists all addressable users from the directory.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the directory fetch fails.
    pub async fn list_users(&self) -> Result<Vec<Participant>, ApiError> {
        self.api.list_users().await
    }

    // -- query surface -------------------------------------------------

    /// The local user's participant record.
    #[must_use]
    pub const fn local_user(&self) -> &Participant {
        &self.local
    }

    /// Conversations ordered for display.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        self.store.conversations()
    }

    /// A single conversation by id.
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.store.conversation(id)
    }

    /// A single message by id.
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.store.message(id)
    }

    /// Reaction state of a message.
    #[must_use]
    pub fn reactions(&self, message_id: &MessageId) -> Option<&ReactionMap> {
        self.reactions.reactions(message_id)
    }

    /// Remote users currently typing in a conversation.
    #[must_use]
    pub fn typing_in(&self, conversation_id: &ConversationId) -> &[TypingPeer] {
        self.typing.typing_in(conversation_id)
    }

    /// Whether a user is online.
    #[must_use]
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.presence.is_online(user_id)
    }

    /// Whether a conversation is flagged unread.
    #[must_use]
    pub fn is_unread(&self, conversation_id: &ConversationId) -> bool {
        self.unread.is_unread(conversation_id)
    }

    /// The active conversation, if one is open.
    #[must_use]
    pub const fn active_conversation(&self) -> Option<&ConversationId> {
        self.unread.active()
    }
}
