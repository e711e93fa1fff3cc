//! In-conversation message search.
//!
//! Case-insensitive substring matching over a newest-first log, producing
//! hits in chronological order. [`SearchCursor`] drives next/previous
//! navigation over the hit list with wrap-around, the way a find-in-chat
//! overlay steps between highlights.

use chatsync_proto::message::{Message, MessageId, MessageStatus};

/// Searches a newest-first message log for a case-insensitive substring.
///
/// Returns matching message ids in chronological order. Deleted messages
/// are skipped (their original content is gone; the placeholder must not
/// match). A blank query matches nothing.
#[must_use]
pub fn search(messages: &[Message], query: &str) -> Vec<MessageId> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    messages
        .iter()
        .rev()
        .filter(|m| m.status != MessageStatus::Deleted)
        .filter(|m| m.text.to_lowercase().contains(&needle))
        .map(|m| m.id.clone())
        .collect()
}

/// Navigates a search hit list.
///
/// Hits are chronological; the cursor starts anchored on the newest hit,
/// `prev` steps toward older hits and `next` toward newer ones, both
/// wrapping around the ends. All operations are no-ops on an empty list.
#[derive(Debug)]
pub struct SearchCursor {
    hits: Vec<MessageId>,
    pos: Option<usize>,
}

impl SearchCursor {
    /// Creates a cursor over chronological hits, anchored on the newest.
    #[must_use]
    pub fn new(hits: Vec<MessageId>) -> Self {
        let pos = hits.len().checked_sub(1);
        Self { hits, pos }
    }

    /// Whether the hit list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Number of hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// The hit the cursor is anchored on.
    #[must_use]
    pub fn current(&self) -> Option<&MessageId> {
        self.pos.and_then(|p| self.hits.get(p))
    }

    /// One-based position of the anchor, for "3 of 7" style display.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.pos.map(|p| p + 1)
    }

    /// Steps to the next (newer) hit, wrapping to the oldest.
    pub fn next(&mut self) -> Option<&MessageId> {
        let pos = self.pos?;
        self.pos = Some(if pos + 1 == self.hits.len() { 0 } else { pos + 1 });
        self.current()
    }

    /// Steps to the previous (older) hit, wrapping to the newest.
    pub fn prev(&mut self) -> Option<&MessageId> {
        let pos = self.pos?;
        self.pos = Some(if pos == 0 { self.hits.len() - 1 } else { pos - 1 });
        self.current()
    }
}
