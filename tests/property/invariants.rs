//! Property tests for the engine's core invariants.
//!
//! - Reconciliation: any interleaving of acknowledgement and broadcast
//!   deliveries (with duplication) converges to exactly one `Sent` entry.
//! - Reactions: a user holds at most one symbol per message under any
//!   operation sequence.
//! - Search: results are exactly the chronological case-insensitive
//!   matches, and cursor navigation cycles through all hits.
//! - Unread: clearing reports `true` at most once per unread episode.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;

use chatsync::reactions::ReactionLedger;
use chatsync::search::{SearchCursor, search};
use chatsync::store::{ConversationStore, Reconcile};
use chatsync::unread::UnreadTracker;

use chatsync_proto::conversation::{Conversation, Participant, Role};
use chatsync_proto::message::{
    ConversationId, Message, MessageId, MessageStatus, Timestamp, UserId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn participant(id: &str) -> Participant {
    Participant {
        id: UserId::new(id),
        display_name: id.to_uppercase(),
        avatar_url: None,
        role: Role::Student,
    }
}

fn store_with_c1() -> ConversationStore {
    let mut store = ConversationStore::new(UserId::new("alice"));
    store.upsert_conversation(Conversation::new(
        ConversationId::new("c1"),
        participant("alice"),
        participant("bob"),
    ));
    store
}

fn pending(text: &str) -> Message {
    Message::pending(
        ConversationId::new("c1"),
        UserId::new("alice"),
        "ALICE",
        text,
        None,
        None,
    )
}

fn canonical(id: &str, sender: &str, text: &str, at: u64) -> Message {
    Message {
        id: MessageId::new(id),
        conversation_id: ConversationId::new("c1"),
        sender_id: UserId::new(sender),
        sender_name: sender.to_uppercase(),
        text: text.into(),
        attachment: None,
        sent_at: Timestamp::from_millis(at),
        status: MessageStatus::Sent,
        forwarded_from: None,
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// One delivery of the canonical record for a single logical send:
/// `true` = acknowledgement (carries the correlation reference),
/// `false` = broadcast (may or may not carry it).
fn delivery_sequences() -> impl Strategy<Value = Vec<(bool, bool)>> {
    // 1 to 4 deliveries, each ack/broadcast, broadcast correlation on/off.
    prop::collection::vec((any::<bool>(), any::<bool>()), 1..=4)
}

proptest! {
    #[test]
    fn any_delivery_interleaving_yields_one_sent_entry(deliveries in delivery_sequences()) {
        let mut store = store_with_c1();
        let conv = ConversationId::new("c1");

        let local = pending("hello there");
        let provisional = local.id.clone();
        store.append_or_reconcile(&conv, local, None);

        for (is_ack, broadcast_correlated) in deliveries {
            let correlated = is_ack || broadcast_correlated;
            let correlation = correlated.then(|| provisional.clone());
            store.append_or_reconcile(
                &conv,
                canonical("m1", "alice", "hello there", 5_000),
                correlation.as_ref(),
            );
        }

        let messages = &store.conversation(&conv).unwrap().messages;
        prop_assert_eq!(messages.len(), 1);
        prop_assert_eq!(messages[0].id.as_str(), "m1");
        prop_assert_eq!(messages[0].status, MessageStatus::Sent);
    }

    #[test]
    fn interleaved_peer_traffic_never_disturbs_reconciliation(
        deliveries in delivery_sequences(),
        peer_texts in prop::collection::vec("[a-z]{1,8}", 0..3),
    ) {
        let mut store = store_with_c1();
        let conv = ConversationId::new("c1");

        let local = pending("mine");
        let provisional = local.id.clone();
        store.append_or_reconcile(&conv, local, None);

        let mut peer_n = 0;
        for text in &peer_texts {
            peer_n += 1;
            store.append_or_reconcile(
                &conv,
                canonical(&format!("p{peer_n}"), "bob", text, 1_000 + peer_n),
                None,
            );
        }
        for (is_ack, broadcast_correlated) in deliveries {
            let correlation = (is_ack || broadcast_correlated).then(|| provisional.clone());
            store.append_or_reconcile(
                &conv,
                canonical("m1", "alice", "mine", 5_000),
                correlation.as_ref(),
            );
        }

        let messages = &store.conversation(&conv).unwrap().messages;
        // Peer messages plus exactly one copy of ours.
        prop_assert_eq!(messages.len(), peer_texts.len() + 1);
        prop_assert_eq!(
            messages.iter().filter(|m| m.id.as_str() == "m1").count(),
            1
        );
        // Newest-first by sent_at throughout.
        for pair in messages.windows(2) {
            prop_assert!(pair[0].sent_at >= pair[1].sent_at);
        }
    }

    #[test]
    fn duplicate_foreign_broadcasts_are_idempotent(copies in 1usize..5) {
        let mut store = store_with_c1();
        let conv = ConversationId::new("c1");

        let mut duplicates = 0;
        for _ in 0..copies {
            let outcome = store.append_or_reconcile(
                &conv,
                canonical("m1", "bob", "yo", 1_000),
                None,
            );
            if outcome == Reconcile::Duplicate {
                duplicates += 1;
            }
        }

        prop_assert_eq!(duplicates, copies - 1);
        prop_assert_eq!(store.conversation(&conv).unwrap().messages.len(), 1);
    }
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ReactionOp {
    Add { user: u8, emoji: u8 },
    Remove { user: u8, emoji: u8 },
}

fn reaction_ops() -> impl Strategy<Value = Vec<ReactionOp>> {
    prop::collection::vec(
        prop_oneof![
            (0u8..3, 0u8..4).prop_map(|(user, emoji)| ReactionOp::Add { user, emoji }),
            (0u8..3, 0u8..4).prop_map(|(user, emoji)| ReactionOp::Remove { user, emoji }),
        ],
        0..30,
    )
}

const EMOJIS: [&str; 4] = ["👍", "❤️", "😀", "🎉"];

proptest! {
    #[test]
    fn a_user_holds_at_most_one_symbol_per_message(ops in reaction_ops()) {
        let mut ledger = ReactionLedger::new();
        let message = MessageId::new("m1");

        for op in ops {
            match op {
                ReactionOp::Add { user, emoji } => {
                    let id = UserId::new(format!("u{user}"));
                    ledger.add(&message, EMOJIS[emoji as usize], &id, "User");
                }
                ReactionOp::Remove { user, emoji } => {
                    let id = UserId::new(format!("u{user}"));
                    ledger.remove(&message, EMOJIS[emoji as usize], &id);
                }
            }
        }

        if let Some(map) = ledger.reactions(&message) {
            for user in 0..3u8 {
                let id = UserId::new(format!("u{user}"));
                let held = map
                    .values()
                    .filter(|reactors| reactors.iter().any(|r| r.user_id == id))
                    .count();
                prop_assert!(held <= 1, "user u{} holds {} symbols", user, held);
            }
            // No empty buckets survive.
            for reactors in map.values() {
                prop_assert!(!reactors.is_empty());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn search_results_match_a_naive_chronological_filter(
        texts in prop::collection::vec("[a-z ]{0,12}", 0..12),
        query in "[a-z]{1,3}",
    ) {
        // Build a newest-first log the way the store keeps it.
        let mut messages: Vec<Message> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| canonical(&format!("m{i}"), "bob", text, 1_000 + i as u64))
            .collect();
        messages.reverse();

        let hits = search(&messages, &query);

        let expected: Vec<MessageId> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| text.contains(&query))
            .map(|(i, _)| MessageId::new(format!("m{i}")))
            .collect();
        prop_assert_eq!(hits.clone(), expected);

        // The cursor cycles through every hit and returns to its anchor.
        let mut cursor = SearchCursor::new(hits.clone());
        if !hits.is_empty() {
            let anchor = cursor.current().cloned();
            for _ in 0..hits.len() {
                cursor.next();
            }
            prop_assert_eq!(cursor.current().cloned(), anchor);
        }
    }
}

// ---------------------------------------------------------------------------
// Unread
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn unread_clear_reports_true_at_most_once_per_episode(
        steps in prop::collection::vec(any::<bool>(), 1..20),
    ) {
        // true = inbound message from the peer, false = clear attempt.
        let mut tracker = UnreadTracker::new(UserId::new("alice"));
        let conv = ConversationId::new("c1");
        let mut flagged = false;

        for inbound in steps {
            if inbound {
                tracker.on_inbound(&conv, &UserId::new("bob"));
                flagged = true;
            } else {
                let cleared = tracker.clear(&conv);
                prop_assert_eq!(cleared, flagged);
                flagged = false;
            }
        }
    }
}
