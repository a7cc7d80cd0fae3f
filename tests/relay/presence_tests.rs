//! Presence Scenario Tests

use chat_relay::domain::{PresenceEvent, WireRecord};
use chat_relay::infrastructure::broker::Topic;
use pretty_assertions::assert_eq;

use crate::common::*;

fn presence_log(app: &TestApp) -> Vec<PresenceEvent> {
    app.broker
        .pending(Topic::OnlineStatus)
        .iter()
        .map(|record| PresenceEvent::decode(&record.payload).unwrap())
        .collect()
}

/// Two tabs for one identity: only the first open and the last close are announced.
#[tokio::test]
async fn test_two_connections_announce_only_edges() {
    let app = TestApp::new();

    let c1 = app.connect(&alice()).await;
    assert_eq!(presence_log(&app), vec![PresenceEvent::online(&alice())]);

    let c2 = app.connect(&alice()).await;
    assert_eq!(presence_log(&app).len(), 1);

    app.disconnect(&c1).await;
    assert!(app.state.registry.is_online(&alice().user_id));
    assert_eq!(presence_log(&app).len(), 1);

    app.disconnect(&c2).await;
    assert!(!app.state.registry.is_online(&alice().user_id));
    assert_eq!(
        presence_log(&app),
        vec![PresenceEvent::online(&alice()), PresenceEvent::offline(&alice())]
    );
}

#[tokio::test]
async fn test_everyone_sees_full_online_set() {
    let app = TestApp::started();

    let mut a = app.connect(&alice()).await;
    let mut b = app.connect(&bob()).await;
    let mut c = app.connect(&carol()).await;

    for connection in [&mut a, &mut b, &mut c] {
        connection.wait_for_online(&["alice", "bob", "carol"]).await;
    }

    app.disconnect(&c).await;
    a.wait_for_online(&["alice", "bob"]).await;
    b.wait_for_online(&["alice", "bob"]).await;

    app.stop().await;
}

#[tokio::test]
async fn test_second_device_gets_snapshot_on_open() {
    let app = TestApp::started();

    let mut b = app.connect(&bob()).await;
    b.wait_for_online(&["bob"]).await;
    let _a1 = app.connect(&alice()).await;
    b.wait_for_online(&["alice", "bob"]).await;

    // No presence record for this one; the snapshot comes from the gateway.
    let mut a2 = app.connect(&alice()).await;
    a2.wait_for_online(&["alice", "bob"]).await;

    app.stop().await;
}

#[tokio::test]
async fn test_closing_one_tab_keeps_identity_listed() {
    let app = TestApp::started();

    let mut b = app.connect(&bob()).await;
    let a1 = app.connect(&alice()).await;
    let _a2 = app.connect(&alice()).await;
    b.wait_for_online(&["alice", "bob"]).await;
    b.settle().await;

    app.disconnect(&a1).await;

    // No offline record, so bob hears nothing new.
    assert!(b.settle().await.is_empty());
    assert_eq!(app.broker.published_count(Topic::OnlineStatus), 2);

    app.stop().await;
}
