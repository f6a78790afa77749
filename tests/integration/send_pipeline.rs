//! Integration tests for the outbound send pipeline: optimistic insert,
//! socket emit with ack, and persistence reconciliation.

use std::sync::Arc;
use std::time::Duration;

use pairchat::api::{ApiError, StubApi};
use pairchat::sync::{ConversationSession, SendError, SyncConfig, SyncEvent};
use pairchat::transport::loopback::{self, LoopbackServer, LoopbackTransport};
use pairchat::transport::TransportEvent;
use pairchat_proto::event::{ClientEvent, SendAck};
use pairchat_proto::message::{DeliveryState, MessageId, UserId};
use tokio::sync::mpsc;

type Session = ConversationSession<LoopbackTransport, StubApi>;

fn setup_with_config(
    config: SyncConfig,
) -> (
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
        config,
    );
    (session, sync_events, transport_events, server, api)
}

fn setup() -> (
    Session,
    mpsc::Receiver<SyncEvent>,
    mpsc::Receiver<TransportEvent>,
    LoopbackServer,
    Arc<StubApi>,
) {
    setup_with_config(SyncConfig::default())
}

/// Wait for a sync event matching the predicate, with a timeout.
async fn wait_for_event(
    rx: &mut mpsc::Receiver<SyncEvent>,
    predicate: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("sync event stream closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for sync event")
}

/// Poll until the condition holds, with a timeout.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

#[tokio::test]
async fn send_without_open_conversation_is_rejected() {
    let _guard = pairchat::logging::init_logging("debug", None);
    let (session, _events, _transport_events, _server, _api) = setup();
    let result = session.send_message("hello", None).await;
    assert_eq!(result, Err(SendError::NoChannelSelected));
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let (session, _events, _transport_events, _server, _api) = setup();
    session.open_conversation(UserId::new("bob")).await.unwrap();
    let result = session.send_message("   \n ", None).await;
    assert_eq!(result, Err(SendError::EmptyMessage));
}

#[tokio::test]
async fn optimistic_record_is_visible_before_persistence_resolves() {
    let (session, mut events, _transport_events, server, api) = setup();
    api.set_send_delay(Duration::from_millis(200));

    session.open_conversation(UserId::new("bob")).await.unwrap();
    let client_id = session.send_message("hi bob", None).await.unwrap();

    // The record is in the log before the backend has answered anything.
    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].delivery_state, DeliveryState::Pending);
    assert_eq!(messages[0].payload.client_id, Some(client_id.clone()));
    assert!(messages[0].payload.id.is_none());
    assert_eq!(messages[0].payload.text.as_deref(), Some("hi bob"));

    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::MessageInserted { index: 0 })
    })
    .await;

    // The socket saw the join and then the message, correlation key intact.
    let (join, _) = server.next_event().await.unwrap();
    assert!(matches!(join, ClientEvent::JoinChannel(_)));
    let (sent, ack) = server.next_event().await.unwrap();
    let ClientEvent::SendMessage(payload) = sent else {
        panic!("expected SendMessage, got {sent:?}");
    };
    assert_eq!(payload.client_id, Some(client_id));
    assert!(ack.is_some());
}

#[tokio::test]
async fn persistence_confirms_the_optimistic_record() {
    let (session, mut events, _transport_events, _server, _api) = setup();
    session.open_conversation(UserId::new("bob")).await.unwrap();
    let client_id = session.send_message("hi", None).await.unwrap();

    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::MessageUpdated { index: 0 })
    })
    .await;

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].delivery_state, DeliveryState::Confirmed);
    assert!(messages[0].payload.id.is_some());
    // The response carried no correlation key; the existing one survives.
    assert_eq!(messages[0].payload.client_id, Some(client_id));
}

#[tokio::test]
async fn echo_and_persistence_converge_on_one_record() {
    let (session, _events, transport_events, server, _api) = setup();
    let runner = session.clone();
    tokio::spawn(async move { runner.run(transport_events).await });

    session.open_conversation(UserId::new("bob")).await.unwrap();
    session.send_message("hi", None).await.unwrap();

    let (_join, _) = server.next_event().await.unwrap();
    let (sent, ack) = server.next_event().await.unwrap();
    let ClientEvent::SendMessage(mut echo) = sent else {
        panic!("expected SendMessage, got {sent:?}");
    };
    ack.unwrap().send(SendAck::ok()).unwrap();

    // The backend broadcasts the stored copy back, id assigned.
    echo.id = Some(MessageId::new("m1"));
    server.deliver(echo).await;

    wait_until(|| {
        let messages = session.messages();
        messages.len() == 1
            && messages[0].delivery_state == DeliveryState::Confirmed
            && messages[0].payload.id.is_some()
    })
    .await;
}

#[tokio::test]
async fn persistence_failure_marks_the_record_failed() {
    let (session, mut events, _transport_events, _server, api) = setup();
    api.fail_next_send(ApiError::Request("backend down".into()));

    session.open_conversation(UserId::new("bob")).await.unwrap();
    let client_id = session.send_message("doomed", None).await.unwrap();

    let failed = wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::MessageFailed { .. })
    })
    .await;
    assert_eq!(
        failed,
        SyncEvent::MessageFailed {
            client_id: client_id.clone()
        }
    );

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].delivery_state, DeliveryState::Failed);
    // Content stays visible so the author can retry by hand.
    assert_eq!(messages[0].payload.text.as_deref(), Some("doomed"));
}

#[tokio::test]
async fn missing_ack_never_fails_a_message() {
    let config = SyncConfig {
        ack_timeout: Duration::from_millis(50),
        ..SyncConfig::default()
    };
    let (session, mut events, _transport_events, _server, _api) = setup_with_config(config);

    session.open_conversation(UserId::new("bob")).await.unwrap();
    session.send_message("hi", None).await.unwrap();

    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::MessageUpdated { .. })
    })
    .await;

    // Let the ack timer expire with no ack ever arriving.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let messages = session.messages();
    assert_eq!(messages[0].delivery_state, DeliveryState::Confirmed);
}

#[tokio::test]
async fn stale_persistence_result_after_switch_is_dropped() {
    let (session, mut events, _transport_events, _server, api) = setup();
    api.set_send_delay(Duration::from_millis(100));

    session.open_conversation(UserId::new("bob")).await.unwrap();
    session.send_message("for bob", None).await.unwrap();
    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::MessageInserted { .. })
    })
    .await;

    // Switch before the persistence request for bob resolves.
    session.open_conversation(UserId::new("carol")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    // Carol's log never sees bob's message or its outcome.
    assert!(session.messages().is_empty());
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(
                event,
                SyncEvent::MessageUpdated { .. } | SyncEvent::MessageFailed { .. }
            ),
            "stale persistence result leaked into the new conversation: {event:?}"
        );
    }
}
