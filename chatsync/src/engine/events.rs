//! Engine event surface and the inbound push-event reducer.

use chatsync_proto::event::PushEvent;
use chatsync_proto::message::{ConversationId, Message, MessageId};

use crate::channel::{Channel, ChannelError, ResourceApi};
use crate::store::Reconcile;

use super::SyncEngine;

/// State-change notification emitted to the rendering layer.
///
/// Events are coarse invalidation hints: the receiver re-reads the engine's
/// query surface rather than carrying full payloads here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The conversation list (ordering, previews, membership) changed.
    ConversationsChanged,
    /// A message was inserted or replaced in a conversation log.
    MessageUpserted {
        /// Conversation holding the message.
        conversation_id: ConversationId,
        /// Current identifier of the message (canonical once reconciled).
        message_id: MessageId,
    },
    /// A send could not complete; the entry is visible as failed.
    MessageFailed {
        /// Conversation holding the message.
        conversation_id: ConversationId,
        /// Provisional identifier of the failed entry.
        message_id: MessageId,
    },
    /// A message was soft-deleted.
    MessageDeleted {
        /// Conversation holding the message.
        conversation_id: ConversationId,
        /// The deleted message.
        message_id: MessageId,
    },
    /// The reaction state of a message changed.
    ReactionsChanged {
        /// The affected message.
        message_id: MessageId,
    },
    /// The set of users shown as typing in a conversation changed.
    TypingChanged {
        /// The affected conversation.
        conversation_id: ConversationId,
    },
    /// The online roster changed.
    PresenceChanged,
    /// A conversation's unread flag flipped.
    UnreadChanged {
        /// The affected conversation.
        conversation_id: ConversationId,
        /// The new flag value.
        unread: bool,
    },
}

impl<C: Channel, A: ResourceApi> SyncEngine<C, A> {
    /// Pulls the next push event off the channel and folds it into state.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the channel cannot deliver, e.g. on
    /// disconnect; the caller reconnects and calls
    /// [`resync`](SyncEngine::resync).
    pub async fn receive_one(&mut self) -> Result<(), ChannelError> {
        let event = self.channel.next_event().await?;
        self.handle_event(event).await;
        Ok(())
    }

    /// Folds a single push event into engine state.
    ///
    /// The reducer is total: unknown references are logged no-ops, never
    /// errors, since pushes race freely with local state.
    pub async fn handle_event(&mut self, event: PushEvent) {
        match event {
            PushEvent::PresenceSnapshot { online } => {
                if self.presence.replace(online) {
                    self.emit(EngineEvent::PresenceChanged);
                }
            }
            PushEvent::PresenceJoin { user_id } => {
                if self.presence.join(user_id) {
                    self.emit(EngineEvent::PresenceChanged);
                }
            }
            PushEvent::PresenceLeave { user_id } => {
                if self.presence.leave(&user_id) {
                    self.emit(EngineEvent::PresenceChanged);
                }
            }
            PushEvent::MessageCreated {
                message,
                correlation,
            } => {
                self.apply_message_created(message, correlation).await;
            }
            PushEvent::MessageDeleted { message_id, .. } => {
                if let Some(conversation_id) = self.store.mark_deleted(&message_id) {
                    self.reactions.clear_message(&message_id);
                    self.emit(EngineEvent::MessageDeleted {
                        conversation_id,
                        message_id,
                    });
                    self.emit(EngineEvent::ConversationsChanged);
                }
            }
            PushEvent::ReactionAdded {
                message_id,
                emoji,
                user_id,
                user_name,
            } => {
                self.reactions.add(&message_id, &emoji, &user_id, &user_name);
                self.emit(EngineEvent::ReactionsChanged { message_id });
            }
            PushEvent::ReactionRemoved {
                message_id,
                emoji,
                user_id,
            } => {
                if self.reactions.remove(&message_id, &emoji, &user_id) {
                    self.emit(EngineEvent::ReactionsChanged { message_id });
                }
            }
            PushEvent::TypingStart {
                conversation_id,
                user_id,
                user_name,
            } => {
                if user_id == self.local.id {
                    return;
                }
                if self.typing.remote_start(
                    &conversation_id,
                    user_id,
                    &user_name,
                    std::time::Instant::now(),
                ) {
                    self.emit(EngineEvent::TypingChanged { conversation_id });
                }
            }
            PushEvent::TypingEnd {
                conversation_id,
                user_id,
            } => {
                if self.typing.remote_end(&conversation_id, &user_id) {
                    self.emit(EngineEvent::TypingChanged { conversation_id });
                }
            }
            PushEvent::ReadReceipt {
                conversation_id,
                reader_id,
            } => {
                // Another device of the local user read the conversation;
                // peers' receipts carry no client-side state.
                if reader_id == self.local.id && self.unread.clear(&conversation_id) {
                    self.store.set_unread(&conversation_id, false);
                    self.emit(EngineEvent::UnreadChanged {
                        conversation_id,
                        unread: false,
                    });
                }
            }
        }
    }

    /// Applies a canonical message broadcast, fetching the conversation
    /// once if it is not known locally.
    async fn apply_message_created(&mut self, message: Message, correlation: Option<MessageId>) {
        let conversation_id = message.conversation_id.clone();

        let mut fetched = false;
        if self.store.conversation(&conversation_id).is_none() {
            match self.api.fetch_conversation(&conversation_id).await {
                Ok(conversation) => {
                    self.store.upsert_conversation(conversation);
                    self.emit(EngineEvent::ConversationsChanged);
                    fetched = true;
                }
                Err(e) => {
                    tracing::warn!(
                        conversation = %conversation_id,
                        error = %e,
                        "dropping message for unfetchable conversation"
                    );
                    return;
                }
            }
        }

        let sender_id = message.sender_id.clone();
        let message_id = message.id.clone();
        match self
            .store
            .append_or_reconcile(&conversation_id, message, correlation.as_ref())
        {
            Reconcile::UnknownConversation => {}
            // A snapshot fetched just above already carries the broadcast
            // message; the event still marks fresh inbound activity.
            Reconcile::Duplicate if !fetched => {}
            outcome => {
                if self.typing.clear_conversation(&conversation_id) {
                    self.emit(EngineEvent::TypingChanged {
                        conversation_id: conversation_id.clone(),
                    });
                }
                if self.unread.on_inbound(&conversation_id, &sender_id) {
                    self.store.set_unread(&conversation_id, true);
                    self.emit(EngineEvent::UnreadChanged {
                        conversation_id: conversation_id.clone(),
                        unread: true,
                    });
                }
                if !matches!(outcome, Reconcile::Duplicate) {
                    self.emit(EngineEvent::MessageUpserted {
                        conversation_id,
                        message_id,
                    });
                    self.emit(EngineEvent::ConversationsChanged);
                }
            }
        }
    }
}
