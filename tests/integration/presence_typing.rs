//! Integration tests for presence tracking and typing indicators.
//!
//! Verifies:
//! 1. Presence snapshots replace the roster wholesale; join/leave apply
//!    increments; real transitions emit events, no-ops don't.
//! 2. Remote typing indicators appear on start, renew their deadline, and
//!    expire after the TTL without a stop event.
//! 3. A message arrival supersedes the typing indicator.
//! 4. Local keystrokes signal typing start once, and the debounce signals
//!    the end after the keyboard goes quiet.
//! 5. Typing signal failures never propagate (fire-and-forget).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, Instant};

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

fn typing_start(user: &str, name: &str) -> PushEvent {
    PushEvent::TypingStart {
        conversation_id: c1(),
        user_id: UserId::new(user),
        user_name: name.into(),
    }
}

fn presence_events(events: &mut mpsc::Receiver<EngineEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, EngineEvent::PresenceChanged) {
            count += 1;
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_replaces_roster() {
    let (mut engine, _server, _events) = engine().await;

    engine
        .handle_event(PushEvent::PresenceSnapshot {
            online: vec![UserId::new("bob"), UserId::new("carol")],
        })
        .await;
    assert!(engine.is_online(&UserId::new("bob")));

    engine
        .handle_event(PushEvent::PresenceSnapshot {
            online: vec![UserId::new("carol")],
        })
        .await;
    assert!(!engine.is_online(&UserId::new("bob")));
    assert!(engine.is_online(&UserId::new("carol")));
}

#[tokio::test]
async fn join_and_leave_apply_increments() {
    let (mut engine, _server, _events) = engine().await;

    engine
        .handle_event(PushEvent::PresenceJoin {
            user_id: UserId::new("bob"),
        })
        .await;
    assert!(engine.is_online(&UserId::new("bob")));

    engine
        .handle_event(PushEvent::PresenceLeave {
            user_id: UserId::new("bob"),
        })
        .await;
    assert!(!engine.is_online(&UserId::new("bob")));
}

#[tokio::test]
async fn redundant_presence_events_emit_nothing() {
    let (mut engine, _server, mut events) = engine().await;
    engine
        .handle_event(PushEvent::PresenceJoin {
            user_id: UserId::new("bob"),
        })
        .await;
    while events.try_recv().is_ok() {}

    // Duplicate join and a leave for an unknown user: both no-ops.
    engine
        .handle_event(PushEvent::PresenceJoin {
            user_id: UserId::new("bob"),
        })
        .await;
    engine
        .handle_event(PushEvent::PresenceLeave {
            user_id: UserId::new("ghost"),
        })
        .await;

    assert_eq!(presence_events(&mut events), 0);
}

// ---------------------------------------------------------------------------
// Remote typing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn typing_start_shows_the_peer() {
    let (mut engine, _server, _events) = engine().await;

    engine.handle_event(typing_start("bob", "Bob")).await;

    let typing = engine.typing_in(&c1());
    assert_eq!(typing.len(), 1);
    assert_eq!(typing[0].user_name, "Bob");
}

#[tokio::test]
async fn typing_indicator_expires_after_ttl() {
    let (mut engine, _server, _events) = engine().await;
    engine.handle_event(typing_start("bob", "Bob")).await;

    engine
        .tick_at(Instant::now() + Duration::from_secs(3))
        .await;

    assert!(engine.typing_in(&c1()).is_empty());
}

#[tokio::test]
async fn typing_end_clears_immediately() {
    let (mut engine, _server, _events) = engine().await;
    engine.handle_event(typing_start("bob", "Bob")).await;

    engine
        .handle_event(PushEvent::TypingEnd {
            conversation_id: c1(),
            user_id: UserId::new("bob"),
        })
        .await;

    assert!(engine.typing_in(&c1()).is_empty());
}

#[tokio::test]
async fn message_arrival_supersedes_typing() {
    let (mut engine, _server, _events) = engine().await;
    engine.handle_event(typing_start("bob", "Bob")).await;

    engine
        .handle_event(PushEvent::MessageCreated {
            message: Message {
                id: MessageId::new("m1"),
                conversation_id: c1(),
                sender_id: UserId::new("bob"),
                sender_name: "Bob".into(),
                text: "done typing".into(),
                attachment: None,
                sent_at: Timestamp::from_millis(1_000),
                status: MessageStatus::Sent,
                forwarded_from: None,
            },
            correlation: None,
        })
        .await;

    assert!(engine.typing_in(&c1()).is_empty());
}

#[tokio::test]
async fn own_typing_broadcast_is_ignored() {
    let (mut engine, _server, _events) = engine().await;

    engine.handle_event(typing_start("alice", "Alice")).await;

    assert!(engine.typing_in(&c1()).is_empty());
}

// ---------------------------------------------------------------------------
// Local typing
// ---------------------------------------------------------------------------

fn typing_signals(server: &ServerHandle) -> Vec<bool> {
    server
        .requests()
        .iter()
        .filter_map(|r| match r {
            ChannelRequest::Typing { is_typing, .. } => Some(*is_typing),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn keystrokes_signal_start_once_then_end_on_quiet() {
    let (mut engine, server, _events) = engine().await;
    let start = Instant::now();

    engine.local_keystroke_at(&c1(), start).await;
    engine
        .local_keystroke_at(&c1(), start + Duration::from_millis(500))
        .await;
    engine
        .local_keystroke_at(&c1(), start + Duration::from_secs(1))
        .await;

    // Keyboard goes quiet past the debounce window.
    engine.tick_at(start + Duration::from_secs(4)).await;

    assert_eq!(typing_signals(&server), vec![true, false]);
}

#[tokio::test]
async fn new_burst_after_quiet_signals_again() {
    let (mut engine, server, _events) = engine().await;
    let start = Instant::now();

    engine.local_keystroke_at(&c1(), start).await;
    engine.tick_at(start + Duration::from_secs(3)).await;
    engine
        .local_keystroke_at(&c1(), start + Duration::from_secs(10))
        .await;

    assert_eq!(typing_signals(&server), vec![true, false, true]);
}

#[tokio::test]
async fn sending_a_message_ends_local_typing() {
    let (mut engine, server, _events) = engine().await;
    let start = Instant::now();
    engine.local_keystroke_at(&c1(), start).await;

    engine
        .send_message(&c1(), "there", None, None)
        .await
        .unwrap();

    assert_eq!(typing_signals(&server), vec![true, false]);
    // No further end signal when the debounce would have lapsed.
    engine.tick_at(start + Duration::from_secs(10)).await;
    assert_eq!(typing_signals(&server), vec![true, false]);
}

#[tokio::test]
async fn typing_signal_failure_is_swallowed() {
    let (mut engine, server, _events) = engine().await;
    server.set_offline(true);

    // Must not panic or surface an error.
    engine.local_keystroke(&c1()).await;
    engine.tick().await;
}
