//! Optimistic send pipeline.
//!
//! A send validates, inserts a pending entry at the head of the log, then
//! uploads and dispatches. Anything failing before the insert is an error;
//! anything failing after it degrades the entry to a visible `Failed`
//! status that only a user-initiated retry re-drives.

use chatsync_proto::attachment::{AttachmentPayload, StoredFile};
use chatsync_proto::message::{
    ConversationId, ForwardRef, Message, MessageId, MessageStatus, Timestamp, ValidationError,
};

use crate::channel::{Channel, ResourceApi};
use crate::store::Reconcile;
use crate::upload::UploadError;

use super::SyncEngine;
use super::events::EngineEvent;

/// Errors from the send pipeline, all raised before any state change.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The target conversation is not in the store.
    #[error("unknown conversation: {0}")]
    UnknownConversation(ConversationId),

    /// The message content failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The attachment payload failed local validation.
    #[error(transparent)]
    Attachment(#[from] UploadError),

    /// No failed entry with the given provisional id to retry.
    #[error("no failed message to retry: {0}")]
    NothingToRetry(MessageId),

    /// The failed entry has an attachment whose bytes were never stored;
    /// the retry call must supply the payload again.
    #[error("attachment bytes required to retry {0}")]
    MissingAttachmentBytes(MessageId),
}

impl<C: Channel, A: ResourceApi> SyncEngine<C, A> {
    /// Sends a message optimistically.
    ///
    /// The returned status reports how far the pipeline got: `Sent` when
    /// the acknowledgement (or an earlier broadcast) canonicalized the
    /// entry, `Failed` when the upload or dispatch failed and the entry
    /// stays visible for a manual retry. The returned id is the canonical
    /// id on success and the provisional id otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] only for failures detected before the
    /// optimistic insert; those leave no trace in the log.
    pub async fn send_message(
        &mut self,
        conversation_id: &ConversationId,
        text: impl Into<String>,
        attachment: Option<AttachmentPayload>,
        forwarded_from: Option<ForwardRef>,
    ) -> Result<(MessageId, MessageStatus), SendError> {
        if self.store.conversation(conversation_id).is_none() {
            return Err(SendError::UnknownConversation(conversation_id.clone()));
        }

        let preview = attachment
            .as_ref()
            .map(|p| p.preview_attachment(format!("local://{}", p.file_name)));
        let pending = Message::pending(
            conversation_id.clone(),
            self.local.id.clone(),
            self.local.display_name.clone(),
            text,
            preview,
            forwarded_from,
        );

        pending.validate(self.config.max_text_len)?;
        if let Some(payload) = &attachment {
            self.uploader.check(payload)?;
        }

        self.insert_pending(&pending);

        if self.typing.local_stop(conversation_id) {
            self.signal_typing(conversation_id, false).await;
        }
        self.clear_unread(conversation_id).await;

        let stored = match &attachment {
            Some(payload) => match self.uploader.upload(&self.api, payload).await {
                Ok(stored) => Some(stored),
                Err(e) => {
                    tracing::warn!(
                        message_id = %pending.id,
                        error = %e,
                        "attachment upload failed"
                    );
                    return Ok(self.fail_send(&pending));
                }
            },
            None => None,
        };

        Ok(self.dispatch_send(&pending, stored).await)
    }

    /// Re-drives a failed entry through the send pipeline.
    ///
    /// The entry is removed from the log and re-inserted pending with the
    /// same provisional id and a fresh local timestamp. An attachment
    /// whose upload never completed needs its payload supplied again; one
    /// already stored is reused without re-uploading.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NothingToRetry`] when no failed entry carries
    /// the id, [`SendError::MissingAttachmentBytes`] when the payload is
    /// required but absent, or a validation error — all before any state
    /// change.
    pub async fn retry_send(
        &mut self,
        provisional_id: &MessageId,
        attachment: Option<AttachmentPayload>,
    ) -> Result<(MessageId, MessageStatus), SendError> {
        let Some(failed) = self.store.message(provisional_id) else {
            return Err(SendError::NothingToRetry(provisional_id.clone()));
        };
        if failed.status != MessageStatus::Failed {
            return Err(SendError::NothingToRetry(provisional_id.clone()));
        }

        let needs_payload = failed
            .attachment
            .as_ref()
            .is_some_and(|a| !a.url.is_stored());
        if needs_payload && attachment.is_none() {
            return Err(SendError::MissingAttachmentBytes(provisional_id.clone()));
        }
        if let Some(payload) = &attachment {
            self.uploader.check(payload)?;
        }

        let Some(mut pending) = self.store.take_failed(provisional_id) else {
            return Err(SendError::NothingToRetry(provisional_id.clone()));
        };
        pending.status = MessageStatus::Pending;
        pending.sent_at = Timestamp::now();
        self.insert_pending(&pending);

        let stored = match (&pending.attachment, attachment) {
            (Some(att), _) if att.url.is_stored() => Some(StoredFile {
                file_name: att.file_name.clone(),
                file_path: att.url.as_str().to_string(),
                file_size: att.file_size,
                mime_type: att.mime_type.clone(),
                is_image: att.is_image,
            }),
            (Some(_), Some(payload)) => match self.uploader.upload(&self.api, &payload).await {
                Ok(stored) => Some(stored),
                Err(e) => {
                    tracing::warn!(
                        message_id = %pending.id,
                        error = %e,
                        "attachment upload failed on retry"
                    );
                    return Ok(self.fail_send(&pending));
                }
            },
            _ => None,
        };

        Ok(self.dispatch_send(&pending, stored).await)
    }

    /// Head-inserts a pending entry and notifies the view.
    fn insert_pending(&mut self, pending: &Message) {
        self.store
            .append_or_reconcile(&pending.conversation_id, pending.clone(), None);
        self.emit(EngineEvent::MessageUpserted {
            conversation_id: pending.conversation_id.clone(),
            message_id: pending.id.clone(),
        });
        self.emit(EngineEvent::ConversationsChanged);
    }

    /// Dispatches the send and reconciles the acknowledgement.
    async fn dispatch_send(
        &mut self,
        pending: &Message,
        stored: Option<StoredFile>,
    ) -> (MessageId, MessageStatus) {
        let ack = self
            .channel
            .send_message(
                &pending.conversation_id,
                pending.text.clone(),
                stored,
                pending.id.clone(),
                pending.forwarded_from.clone(),
            )
            .await;

        match ack {
            Ok(canonical) => {
                let canonical_id = canonical.id.clone();
                let outcome = self.store.append_or_reconcile(
                    &pending.conversation_id,
                    canonical,
                    Some(&pending.id),
                );
                // Duplicate means the broadcast won the race; the entry is
                // already canonical either way.
                if !matches!(outcome, Reconcile::Duplicate) {
                    self.emit(EngineEvent::MessageUpserted {
                        conversation_id: pending.conversation_id.clone(),
                        message_id: canonical_id.clone(),
                    });
                    self.emit(EngineEvent::ConversationsChanged);
                }
                (canonical_id, MessageStatus::Sent)
            }
            Err(e) => {
                tracing::warn!(
                    message_id = %pending.id,
                    conversation = %pending.conversation_id,
                    error = %e,
                    "send failed"
                );
                self.fail_send(pending)
            }
        }
    }

    /// Marks the pending entry failed and notifies the view.
    fn fail_send(&mut self, pending: &Message) -> (MessageId, MessageStatus) {
        self.store.mark_failed(&pending.id);
        self.emit(EngineEvent::MessageFailed {
            conversation_id: pending.conversation_id.clone(),
            message_id: pending.id.clone(),
        });
        (pending.id.clone(), MessageStatus::Failed)
    }
}
