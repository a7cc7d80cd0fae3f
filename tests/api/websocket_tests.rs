//! WebSocket Gateway Tests
//!
//! Drive the `/chat` endpoint over a real socket.

use std::time::Duration;

use axum_test::TestWebSocket;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use chat_relay::domain::{PresenceEvent, WireRecord};
use chat_relay::infrastructure::broker::{BrokerClient, Topic};

use crate::common::*;

async fn next_frame(socket: &mut TestWebSocket) -> Value {
    tokio::time::timeout(EVENT_WAIT, socket.receive_json::<Value>())
        .await
        .expect("no frame received")
}

/// Skip frames until a dispatch with the given event name arrives
async fn next_dispatch(socket: &mut TestWebSocket, event: &str) -> Value {
    loop {
        let frame = next_frame(socket).await;
        if frame["op"] == 0 && frame["t"] == event {
            return frame;
        }
    }
}

async fn open_socket(app: &TestApp, identity: &chat_relay::domain::Identity) -> TestWebSocket {
    app.ws_server()
        .get_websocket("/chat")
        .add_query_param("access_token", token_for(identity))
        .await
        .into_websocket()
        .await
}

fn invoke(recipient_user_id: &str, content: &str) -> Value {
    json!({
        "op": 2,
        "t": "sendPrivateMessage",
        "d": { "recipientUserId": recipient_user_id, "content": content },
    })
}

async fn wait_until_offline(app: &TestApp, identity: &chat_relay::domain::Identity) {
    for _ in 0..100 {
        if !app.state.registry.is_online(&identity.user_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} still registered", identity.username);
}

#[tokio::test]
async fn test_hello_then_online_snapshot() {
    let app = TestApp::new();
    let mut socket = open_socket(&app, &alice()).await;

    let hello = next_frame(&mut socket).await;
    assert_eq!(hello["op"], 10);
    assert_eq!(
        hello["d"]["heartbeat_interval"],
        app.state.settings.websocket.heartbeat_interval_ms
    );

    let snapshot = next_frame(&mut socket).await;
    assert_eq!(snapshot["op"], 0);
    assert_eq!(snapshot["s"], 1);
    assert_eq!(snapshot["t"], "receiveOnlineUsers");
    assert_eq!(snapshot["d"], json!([{ "userId": "u-alice", "username": "alice" }]));
    assert!(app.state.registry.is_online(&alice().user_id));
}

#[tokio::test]
async fn test_invoke_yields_sequenced_system_messages() {
    let app = TestApp::new();
    let mut socket = open_socket(&app, &alice()).await;
    next_dispatch(&mut socket, "receiveOnlineUsers").await;

    socket.send_json(&json!({ "op": 1 })).await;
    let ack = next_frame(&mut socket).await;
    assert_eq!(ack["op"], 11);
    assert!(ack.get("s").is_none());

    socket.send_json(&invoke("u-bob", "hi")).await;
    let sent = next_dispatch(&mut socket, "receiveSystemMessage").await;
    assert_eq!(sent["d"], "Message sent to bob.");
    assert_eq!(sent["s"], 2);

    socket.send_json(&invoke("ghost", "hi")).await;
    let unknown = next_dispatch(&mut socket, "receiveSystemMessage").await;
    assert_eq!(unknown["d"], "Error: Recipient not identified.");
    assert_eq!(unknown["s"], 3);

    socket.send_json(&invoke("u-bob", "   ")).await;
    let invalid = next_dispatch(&mut socket, "receiveSystemMessage").await;
    assert_eq!(invalid["d"], "Error: Message content is invalid.");
    assert_eq!(invalid["s"], 4);
}

#[tokio::test]
async fn test_message_from_socket_reaches_recipient() {
    let app = TestApp::started();
    let mut bob = app.connect(&bob()).await;
    let mut socket = open_socket(&app, &alice()).await;
    next_dispatch(&mut socket, "receiveOnlineUsers").await;

    socket.send_json(&invoke("u-bob", "over the wire")).await;

    let message = bob.next_message().await;
    assert_eq!(message.content, "over the wire");
    assert_eq!(message.sender_username, "alice");

    let echo = next_dispatch(&mut socket, "receivePrivateMessage").await;
    assert_eq!(echo["d"]["id"], message.id.as_str());

    app.stop().await;
}

#[tokio::test]
async fn test_close_publishes_offline_once() {
    let app = TestApp::new();
    let mut socket = open_socket(&app, &alice()).await;
    next_dispatch(&mut socket, "receiveOnlineUsers").await;

    socket.close().await;
    wait_until_offline(&app, &alice()).await;
    assert_eq!(app.state.registry.total_connections(), 0);

    let presence: Vec<PresenceEvent> = app
        .broker
        .poll(Topic::OnlineStatus)
        .await
        .unwrap()
        .iter()
        .map(|record| PresenceEvent::decode(&record.payload).unwrap())
        .collect();
    assert_eq!(
        presence,
        vec![PresenceEvent::online(&alice()), PresenceEvent::offline(&alice())]
    );
}
