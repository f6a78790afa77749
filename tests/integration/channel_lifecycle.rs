//! Integration tests for conversation open/close and channel membership.

use std::sync::Arc;
use std::time::Duration;

use pairchat::api::StubApi;
use pairchat::sync::{ConversationSession, SyncConfig, SyncEvent};
use pairchat::transport::loopback::{self, LoopbackServer, LoopbackTransport};
use pairchat::transport::TransportEvent;
use pairchat_proto::channel::ChannelId;
use pairchat_proto::event::ClientEvent;
use pairchat_proto::message::{DeliveryState, MessageId, MessagePayload, Timestamp, UserId};
use tokio::sync::mpsc;

type Session = ConversationSession<LoopbackTransport, StubApi>;

fn setup() -> (
    Session,
    mpsc::Receiver<SyncEvent>,
    mpsc::Receiver<TransportEvent>,
    LoopbackServer,
    Arc<StubApi>,
) {
    let (transport, transport_events, server) = loopback::create_pair(32);
    let api = Arc::new(StubApi::new(UserId::new("alice"), "Alice"));
    let (session, sync_events) = ConversationSession::new(
        Arc::new(transport),
        Arc::clone(&api),
        UserId::new("alice"),
        "Alice",
        SyncConfig::default(),
    );
    (session, sync_events, transport_events, server, api)
}

fn stored(id: &str, from: &str, channel: &ChannelId, text: &str) -> MessagePayload {
    MessagePayload {
        id: Some(MessageId::new(id)),
        client_id: None,
        channel_id: channel.clone(),
        sender_id: UserId::new(from),
        sender_name: from.to_uppercase(),
        text: Some(text.into()),
        attachment: None,
        created_at: Timestamp::from_millis(1_000),
    }
}

/// Assert that no further client event crosses the wire within 50ms.
async fn assert_wire_quiet(server: &LoopbackServer) {
    let extra = tokio::time::timeout(Duration::from_millis(50), server.next_event()).await;
    assert!(extra.is_err(), "unexpected wire event: {extra:?}");
}

#[tokio::test]
async fn open_joins_the_derived_channel() {
    let (session, _events, _transport_events, server, _api) = setup();

    let channel = session.open_conversation(UserId::new("bob")).await.unwrap();
    assert_eq!(channel.as_str(), "alice:bob");
    assert_eq!(session.channel(), Some(channel.clone()));

    let (event, _) = server.next_event().await.unwrap();
    assert_eq!(event, ClientEvent::JoinChannel(channel));
}

#[tokio::test]
async fn open_seeds_the_log_from_history() {
    let (session, _events, _transport_events, _server, api) = setup();
    let channel = ChannelId::between(&UserId::new("alice"), &UserId::new("bob"));
    api.seed_history(vec![
        stored("m1", "bob", &channel, "hey"),
        stored("m2", "alice", &channel, "hi back"),
    ]);

    session.open_conversation(UserId::new("bob")).await.unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .all(|m| m.delivery_state == DeliveryState::Confirmed));
    assert_eq!(messages[0].payload.text.as_deref(), Some("hey"));
}

#[tokio::test]
async fn switching_conversations_leaves_before_joining() {
    let (session, _events, _transport_events, server, api) = setup();
    let bob_channel = ChannelId::between(&UserId::new("alice"), &UserId::new("bob"));
    api.seed_history(vec![stored("m1", "bob", &bob_channel, "old talk")]);

    session.open_conversation(UserId::new("bob")).await.unwrap();
    assert_eq!(session.messages().len(), 1);

    api.seed_history(Vec::new());
    session.open_conversation(UserId::new("carol")).await.unwrap();

    let (first, _) = server.next_event().await.unwrap();
    assert_eq!(first, ClientEvent::JoinChannel(ChannelId::new("alice:bob")));
    let (second, _) = server.next_event().await.unwrap();
    assert_eq!(second, ClientEvent::LeaveChannel(ChannelId::new("alice:bob")));
    let (third, _) = server.next_event().await.unwrap();
    assert_eq!(third, ClientEvent::JoinChannel(ChannelId::new("alice:carol")));

    // Bob's messages do not leak into carol's conversation.
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn reopening_the_same_conversation_joins_once() {
    let (session, _events, _transport_events, server, _api) = setup();

    session.open_conversation(UserId::new("bob")).await.unwrap();
    session.open_conversation(UserId::new("bob")).await.unwrap();

    let (event, _) = server.next_event().await.unwrap();
    assert!(matches!(event, ClientEvent::JoinChannel(_)));
    assert_wire_quiet(&server).await;
}

#[tokio::test]
async fn close_leaves_the_channel_and_clears_state() {
    let (session, _events, _transport_events, server, api) = setup();
    let channel = ChannelId::between(&UserId::new("alice"), &UserId::new("bob"));
    api.seed_history(vec![stored("m1", "bob", &channel, "hey")]);

    session.open_conversation(UserId::new("bob")).await.unwrap();
    let _ = server.next_event().await;

    session.close_conversation().await;
    assert!(session.channel().is_none());
    assert!(session.messages().is_empty());
    assert!(session.suggestions().is_empty());

    let (event, _) = server.next_event().await.unwrap();
    assert_eq!(event, ClientEvent::LeaveChannel(channel));
}

#[tokio::test]
async fn delivery_for_a_foreign_channel_is_dropped() {
    let (session, mut events, transport_events, server, _api) = setup();
    let runner = session.clone();
    tokio::spawn(async move { runner.run(transport_events).await });

    session.open_conversation(UserId::new("bob")).await.unwrap();

    let foreign = ChannelId::between(&UserId::new("alice"), &UserId::new("carol"));
    server.deliver(stored("m9", "carol", &foreign, "wrong room")).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.messages().is_empty());
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, SyncEvent::MessageInserted { .. }),
            "foreign delivery reached the log: {event:?}"
        );
    }
}

#[tokio::test]
async fn delivery_with_no_open_conversation_is_dropped() {
    let (session, mut events, transport_events, server, _api) = setup();
    let runner = session.clone();
    tokio::spawn(async move { runner.run(transport_events).await });

    let channel = ChannelId::between(&UserId::new("alice"), &UserId::new("bob"));
    server.deliver(stored("m1", "bob", &channel, "anyone there?")).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.messages().is_empty());
    assert!(events.try_recv().is_err());
}
