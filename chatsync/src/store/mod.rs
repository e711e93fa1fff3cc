//! Conversation store: the single source of truth for the conversation
//! list and per-conversation message logs.
//!
//! All other components read and write through this store. Its core
//! operation, [`ConversationStore::append_or_reconcile`], merges an
//! optimistic local insert with up to two independent arrivals of the
//! canonical record (acknowledgement and broadcast, in either order, each
//! possibly duplicated) without ever producing duplicate, missing, or
//! misordered messages.
//!
//! Operations referencing unknown conversations or messages are logged
//! no-ops: inbound events racing with local state are expected, so the
//! store never errors on missing data.

use chatsync_proto::conversation::{Conversation, Participant};
use chatsync_proto::message::{ConversationId, Message, MessageId, MessageStatus, UserId};

/// Outcome of [`ConversationStore::append_or_reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconcile {
    /// A pending optimistic entry was head-inserted.
    InsertedPending,
    /// A canonical arrival replaced a pending entry in place.
    Canonicalized {
        /// The provisional identifier that was replaced.
        replaced: MessageId,
    },
    /// A canonical arrival had no pending counterpart (e.g. originated on
    /// another device) and was inserted fresh.
    InsertedCanonical,
    /// The arrival duplicated an already-canonical entry and was discarded.
    Duplicate,
    /// The referenced conversation is not in the store.
    UnknownConversation,
}

/// Ordered collection of conversations and their message logs.
#[derive(Debug)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    local_user: UserId,
}

impl ConversationStore {
    /// Creates an empty store for the given local user.
    #[must_use]
    pub const fn new(local_user: UserId) -> Self {
        Self {
            conversations: Vec::new(),
            local_user,
        }
    }

    /// The local user this store belongs to.
    #[must_use]
    pub const fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// Conversations ordered by `last_message_time` descending,
    /// conversations with no messages last.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Looks up a conversation by id.
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == *id)
    }

    /// Looks up a message by id across all conversations.
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.conversations
            .iter()
            .flat_map(|c| c.messages.iter())
            .find(|m| m.id == *id)
    }

    /// Finds the conversation between the local user and `peer`, if any.
    #[must_use]
    pub fn conversation_with(&self, peer: &UserId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|c| c.is_between(&self.local_user, peer))
    }

    /// Inserts a conversation or merges it into an existing one with the
    /// same id, then re-sorts the list.
    ///
    /// Merging keeps the local message log and unread flag when the
    /// incoming copy has no messages (a metadata-only fetch).
    pub fn upsert_conversation(&mut self, incoming: Conversation) {
        if let Some(existing) = self.conversations.iter_mut().find(|c| c.id == incoming.id) {
            existing.participants = incoming.participants;
            if !incoming.messages.is_empty() {
                existing.messages = incoming.messages;
            }
            if incoming.last_message_time.is_some() {
                existing.last_message = incoming.last_message;
                existing.last_message_time = incoming.last_message_time;
            }
        } else {
            self.conversations.push(incoming);
        }
        self.sort_conversations();
    }

    /// Finds the conversation with `peer` or creates an empty one.
    ///
    /// Idempotent: re-requesting with the same pair returns the existing
    /// conversation's id.
    pub fn find_or_create_with(&mut self, local: Participant, peer: Participant) -> ConversationId {
        if let Some(existing) = self.conversation_with(&peer.id) {
            return existing.id.clone();
        }
        let conversation = Conversation::new(ConversationId::generate(), local, peer);
        let id = conversation.id.clone();
        self.conversations.push(conversation);
        self.sort_conversations();
        id
    }

    /// Appends an optimistic pending message or reconciles a canonical
    /// arrival against the log.
    ///
    /// Canonical arrivals (status ≠ `Pending`) are matched against pending
    /// entries first by the exact `correlation` reference, then by sender,
    /// text content, and attachment file name. A matched pending entry is
    /// replaced in place and repositioned by server `sent_at`; an
    /// unmatched canonical arrival is inserted fresh; an arrival whose id
    /// is already canonical in the log is discarded. The operation is
    /// idempotent and commutative for the acknowledgement/broadcast pair
    /// of the same logical send.
    pub fn append_or_reconcile(
        &mut self,
        conversation_id: &ConversationId,
        incoming: Message,
        correlation: Option<&MessageId>,
    ) -> Reconcile {
        let Some(conv) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == *conversation_id)
        else {
            tracing::debug!(
                conversation = %conversation_id,
                message = %incoming.id,
                "message for unknown conversation, ignoring"
            );
            return Reconcile::UnknownConversation;
        };

        if conv.messages.iter().any(|m| m.id == incoming.id) {
            // Pending ids are provisional and unique, so any id hit means
            // the canonical record is already in the log.
            tracing::debug!(message = %incoming.id, "duplicate arrival discarded");
            return Reconcile::Duplicate;
        }

        if incoming.status == MessageStatus::Pending {
            conv.messages.insert(0, incoming);
            Self::refresh_preview(conv);
            self.sort_conversations();
            return Reconcile::InsertedPending;
        }

        let mut canonical = incoming;
        canonical.status = MessageStatus::Sent;

        let matched = Self::find_pending_slot(conv, &canonical, correlation);
        let outcome = if let Some(pos) = matched {
            let replaced = conv.messages[pos].id.clone();
            conv.messages[pos] = canonical;
            Reconcile::Canonicalized { replaced }
        } else {
            conv.messages.insert(0, canonical);
            Reconcile::InsertedCanonical
        };

        // Once canonical, position reflects server-assigned sent_at; the
        // head insertion during the pending phase was display-only.
        conv.messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Self::refresh_preview(conv);
        self.sort_conversations();
        outcome
    }

    /// Locates the best matching pending entry for a canonical arrival.
    fn find_pending_slot(
        conv: &Conversation,
        canonical: &Message,
        correlation: Option<&MessageId>,
    ) -> Option<usize> {
        if let Some(corr) = correlation
            && let Some(pos) = conv
                .messages
                .iter()
                .position(|m| m.status == MessageStatus::Pending && m.id == *corr)
        {
            return Some(pos);
        }
        conv.messages.iter().position(|m| {
            m.status == MessageStatus::Pending
                && m.sender_id == canonical.sender_id
                && m.text == canonical.text
                && match (&m.attachment, &canonical.attachment) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.file_name == b.file_name,
                    _ => false,
                }
        })
    }

    /// Soft-deletes a message by id, wherever it lives.
    ///
    /// The entry keeps its position and its attachment metadata (hidden
    /// from rendering); the displayed content becomes a fixed placeholder.
    /// Returns the conversation the message was found in, or `None` if the
    /// id is unknown (logged no-op).
    pub fn mark_deleted(&mut self, message_id: &MessageId) -> Option<ConversationId> {
        for conv in &mut self.conversations {
            if let Some(msg) = conv.messages.iter_mut().find(|m| m.id == *message_id) {
                msg.mark_deleted();
                Self::refresh_preview(conv);
                return Some(conv.id.clone());
            }
        }
        tracing::debug!(message = %message_id, "delete for unknown message, ignoring");
        None
    }

    /// Transitions a pending or previously failed entry to `Failed`,
    /// leaving it visible for a manual retry.
    pub fn mark_failed(&mut self, provisional_id: &MessageId) -> bool {
        for conv in &mut self.conversations {
            if let Some(msg) = conv
                .messages
                .iter_mut()
                .find(|m| m.id == *provisional_id && m.status != MessageStatus::Sent)
            {
                msg.status = MessageStatus::Failed;
                return true;
            }
        }
        tracing::debug!(message = %provisional_id, "mark_failed for unknown message, ignoring");
        false
    }

    /// Removes a failed entry so it can be re-driven through the send
    /// pipeline. Returns the removed message.
    pub fn take_failed(&mut self, provisional_id: &MessageId) -> Option<Message> {
        for conv in &mut self.conversations {
            if let Some(pos) = conv
                .messages
                .iter()
                .position(|m| m.id == *provisional_id && m.status == MessageStatus::Failed)
            {
                let msg = conv.messages.remove(pos);
                Self::refresh_preview(conv);
                return Some(msg);
            }
        }
        None
    }

    /// Sets the cached unread flag. Returns `true` if the flag changed.
    pub fn set_unread(&mut self, id: &ConversationId, unread: bool) -> bool {
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == *id)
            && conv.unread != unread
        {
            conv.unread = unread;
            return true;
        }
        false
    }

    /// Replaces the store contents with a freshly fetched canonical list,
    /// re-applying any still-pending or failed local entries through the
    /// reconciliation rule.
    ///
    /// A local entry whose send actually landed server-side appears in the
    /// fresh log as a canonical record matching by sender, text, and
    /// attachment name; such entries are dropped rather than re-inserted.
    /// Failed entries survive the merge as failed, keeping the manual
    /// retry affordance. Local entries of conversations absent from the
    /// fresh list are discarded with a warning.
    pub fn merge_snapshot(&mut self, fresh: Vec<Conversation>) {
        let mut local: Vec<Message> = Vec::new();
        let mut unread: Vec<ConversationId> = Vec::new();
        for conv in &self.conversations {
            if conv.unread {
                unread.push(conv.id.clone());
            }
            local.extend(
                conv.messages
                    .iter()
                    .filter(|m| {
                        matches!(m.status, MessageStatus::Pending | MessageStatus::Failed)
                    })
                    .cloned(),
            );
        }

        self.conversations = fresh;
        for id in unread {
            self.set_unread(&id, true);
        }

        for msg in local {
            let conversation_id = msg.conversation_id.clone();
            let Some(conv) = self
                .conversations
                .iter_mut()
                .find(|c| c.id == conversation_id)
            else {
                tracing::warn!(
                    conversation = %conversation_id,
                    message = %msg.id,
                    "local message for conversation missing from snapshot, dropping"
                );
                continue;
            };
            let delivered = conv.messages.iter().any(|m| {
                m.status != MessageStatus::Pending
                    && m.sender_id == msg.sender_id
                    && m.text == msg.text
                    && match (&m.attachment, &msg.attachment) {
                        (None, None) => true,
                        (Some(a), Some(b)) => a.file_name == b.file_name,
                        _ => false,
                    }
            });
            if delivered {
                tracing::debug!(message = %msg.id, "local entry already delivered, dropping");
                continue;
            }
            if msg.status == MessageStatus::Failed {
                // Head-insert verbatim; reconciliation would mistake the
                // failed entry for a canonical arrival.
                conv.messages.insert(0, msg);
            } else {
                self.append_or_reconcile(&conversation_id, msg, None);
            }
        }

        self.sort_conversations();
    }

    /// Recomputes the list-ordering snippet fields from the head of the log.
    fn refresh_preview(conv: &mut Conversation) {
        if let Some(head) = conv.messages.first() {
            conv.last_message = Some(head.text.clone());
            conv.last_message_time = Some(head.sent_at);
        }
    }

    /// Re-sorts by `last_message_time` descending, empty conversations last.
    fn sort_conversations(&mut self) {
        self.conversations
            .sort_by(|a, b| match (&a.last_message_time, &b.last_message_time) {
                (Some(a_t), Some(b_t)) => b_t.cmp(a_t),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
    }
}
