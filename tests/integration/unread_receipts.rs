//! Integration tests for unread tracking and read receipts.
//!
//! Verifies:
//! 1. Inbound messages flag their conversation unread only when it is not
//!    active and the sender is not the local user — including when the
//!    conversation had to be fetched on first contact.
//! 2. Opening a conversation clears the flag and sends exactly one
//!    mark-as-read call; repeated opens and interactions send nothing.
//! 3. A read receipt from the local user's other device clears the flag
//!    without a round trip.
//! 4. Sending into a conversation clears its unread flag.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chatsync::channel::loopback::{InMemoryApi, LoopbackChannel, ServerHandle};
use chatsync::config::EngineConfig;
use chatsync::engine::{EngineEvent, SyncEngine};

use chatsync_proto::conversation::{Conversation, Participant, Role};
use chatsync_proto::event::{ChannelRequest, PushEvent};
use chatsync_proto::message::{
    ConversationId, Message, MessageId, MessageStatus, Timestamp, UserId,
};

use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn participant(id: &str, name: &str) -> Participant {
    Participant {
        id: UserId::new(id),
        display_name: name.into(),
        avatar_url: None,
        role: Role::Student,
    }
}

fn inbound(id: &str, conv: &str, sender: &str, text: &str, at: u64) -> PushEvent {
    PushEvent::MessageCreated {
        message: Message {
            id: MessageId::new(id),
            conversation_id: ConversationId::new(conv),
            sender_id: UserId::new(sender),
            sender_name: sender.to_string(),
            text: text.into(),
            attachment: None,
            sent_at: Timestamp::from_millis(at),
            status: MessageStatus::Sent,
            forwarded_from: None,
        },
        correlation: None,
    }
}

async fn engine() -> (
    SyncEngine<LoopbackChannel, InMemoryApi>,
    ServerHandle,
    mpsc::Receiver<EngineEvent>,
) {
    let (channel, server) = LoopbackChannel::create(UserId::new("alice"), "Alice", 64);
    let api = InMemoryApi::new();
    api.put_conversation(Conversation::new(
        ConversationId::new("c1"),
        participant("alice", "Alice"),
        participant("bob", "Bob"),
    ));
    api.put_conversation(Conversation::new(
        ConversationId::new("c2"),
        participant("alice", "Alice"),
        participant("carol", "Carol"),
    ));
    let (mut engine, events) = SyncEngine::new(
        channel,
        api,
        participant("alice", "Alice"),
        EngineConfig::default(),
    );
    engine.resync().await.unwrap();
    (engine, server, events)
}

fn c1() -> ConversationId {
    ConversationId::new("c1")
}

fn mark_as_read_count(server: &ServerHandle) -> usize {
    server
        .requests()
        .iter()
        .filter(|r| matches!(r, ChannelRequest::MarkAsRead { .. }))
        .count()
}

// ---------------------------------------------------------------------------
// Flagging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inbound_message_flags_inactive_conversation() {
    let (mut engine, _server, _events) = engine().await;

    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;

    assert!(engine.is_unread(&c1()));
    assert!(engine.conversation(&c1()).unwrap().unread);
}

#[tokio::test]
async fn inbound_message_does_not_flag_active_conversation() {
    let (mut engine, _server, _events) = engine().await;
    engine.open_conversation(&c1()).await;

    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;

    assert!(!engine.is_unread(&c1()));
}

#[tokio::test]
async fn own_broadcast_from_another_device_does_not_flag() {
    let (mut engine, _server, _events) = engine().await;

    engine
        .handle_event(inbound("m1", "c1", "alice", "sent elsewhere", 1_000))
        .await;

    assert!(!engine.is_unread(&c1()));
    // The message itself still lands in the log.
    assert_eq!(engine.conversation(&c1()).unwrap().messages.len(), 1);
}

#[tokio::test]
async fn message_for_a_freshly_fetched_conversation_still_flags_unread() {
    let (channel, _server) = LoopbackChannel::create(UserId::new("alice"), "Alice", 64);
    let api = Arc::new(InMemoryApi::new());
    let (mut engine, _events) = SyncEngine::new(
        channel,
        Arc::clone(&api),
        participant("alice", "Alice"),
        EngineConfig::default(),
    );
    engine.resync().await.unwrap();

    // A conversation the engine has never seen; its server-side snapshot
    // already carries the message the broadcast announces.
    let message = Message {
        id: MessageId::new("m99"),
        conversation_id: ConversationId::new("c3"),
        sender_id: UserId::new("carol"),
        sender_name: "Carol".into(),
        text: "first contact".into(),
        attachment: None,
        sent_at: Timestamp::from_millis(1_000),
        status: MessageStatus::Sent,
        forwarded_from: None,
    };
    let mut conv = Conversation::new(
        ConversationId::new("c3"),
        participant("alice", "Alice"),
        participant("carol", "Carol"),
    );
    conv.messages = vec![message.clone()];
    api.put_conversation(conv);

    engine
        .handle_event(PushEvent::MessageCreated {
            message,
            correlation: None,
        })
        .await;

    let c3 = ConversationId::new("c3");
    assert!(engine.is_unread(&c3));
    assert!(engine.conversation(&c3).unwrap().unread);
    assert_eq!(engine.conversation(&c3).unwrap().messages.len(), 1);
}

#[tokio::test]
async fn flags_are_per_conversation() {
    let (mut engine, _server, _events) = engine().await;
    engine.open_conversation(&c1()).await;

    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;
    engine
        .handle_event(inbound("m2", "c2", "carol", "hello", 2_000))
        .await;

    assert!(!engine.is_unread(&c1()));
    assert!(engine.is_unread(&ConversationId::new("c2")));
}

// ---------------------------------------------------------------------------
// Clearing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn opening_clears_and_marks_read_once() {
    let (mut engine, server, _events) = engine().await;
    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;
    server.clear_requests();

    engine.open_conversation(&c1()).await;
    engine.open_conversation(&c1()).await;
    engine.interaction(&c1()).await;

    assert!(!engine.is_unread(&c1()));
    assert_eq!(mark_as_read_count(&server), 1);
}

#[tokio::test]
async fn interaction_clears_only_the_active_conversation() {
    let (mut engine, server, _events) = engine().await;
    engine
        .handle_event(inbound("m2", "c2", "carol", "hello", 2_000))
        .await;
    engine.open_conversation(&c1()).await;
    server.clear_requests();

    // Interaction targeting a non-active conversation is ignored.
    engine.interaction(&ConversationId::new("c2")).await;

    assert!(engine.is_unread(&ConversationId::new("c2")));
    assert_eq!(mark_as_read_count(&server), 0);
}

#[tokio::test]
async fn sending_into_a_conversation_clears_its_flag() {
    let (mut engine, server, _events) = engine().await;
    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;
    server.clear_requests();

    engine
        .send_message(&c1(), "replying", None, None)
        .await
        .unwrap();

    assert!(!engine.is_unread(&c1()));
    assert_eq!(mark_as_read_count(&server), 1);
}

#[tokio::test]
async fn receipt_from_other_device_clears_without_a_call() {
    let (mut engine, server, _events) = engine().await;
    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;
    server.clear_requests();

    engine
        .handle_event(PushEvent::ReadReceipt {
            conversation_id: c1(),
            reader_id: UserId::new("alice"),
        })
        .await;

    assert!(!engine.is_unread(&c1()));
    assert_eq!(mark_as_read_count(&server), 0);
}

#[tokio::test]
async fn peer_receipt_does_not_touch_our_flag() {
    let (mut engine, _server, _events) = engine().await;
    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;

    engine
        .handle_event(PushEvent::ReadReceipt {
            conversation_id: c1(),
            reader_id: UserId::new("bob"),
        })
        .await;

    assert!(engine.is_unread(&c1()));
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unread_transitions_emit_events() {
    let (mut engine, _server, mut events) = engine().await;
    while events.try_recv().is_ok() {}

    engine.handle_event(inbound("m1", "c1", "bob", "hi", 1_000)).await;
    engine.open_conversation(&c1()).await;

    let unread_changes: Vec<bool> = {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::UnreadChanged { unread, .. } = event {
                seen.push(unread);
            }
        }
        seen
    };
    assert_eq!(unread_changes, vec![true, false]);
}
