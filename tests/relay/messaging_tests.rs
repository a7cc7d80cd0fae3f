//! Messaging Scenario Tests

use chat_relay::domain::Identity;
use chat_relay::infrastructure::broker::Topic;
use pretty_assertions::assert_eq;

use crate::common::*;

#[tokio::test]
async fn test_message_to_ghost_yields_one_error_and_no_record() {
    let app = TestApp::started();
    let mut a = app.connect(&alice()).await;
    a.settle().await;

    app.send(&a, &Identity::new("ghost", "ghost"), "anyone there?").await;

    let events = a.settle().await;
    assert_eq!(system_messages(&events), vec!["Error: Recipient not identified."]);
    assert!(private_messages(&events).is_empty());
    assert_eq!(app.broker.published_count(Topic::ChatMessages), 0);

    app.stop().await;
}

/// A has two tabs, B has two tabs, C is online but uninvolved.
#[tokio::test]
async fn test_message_reaches_all_devices_of_both_parties_only() {
    let app = TestApp::started();
    let mut a1 = app.connect(&alice()).await;
    let mut a2 = app.connect(&alice()).await;
    let mut b1 = app.connect(&bob()).await;
    let mut b2 = app.connect(&bob()).await;
    let mut c1 = app.connect(&carol()).await;
    for connection in [&mut a1, &mut a2, &mut b1, &mut b2, &mut c1] {
        connection.wait_for_online(&["alice", "bob", "carol"]).await;
    }

    app.send(&a1, &bob(), "hello bob").await;

    for connection in [&mut a1, &mut a2, &mut b1, &mut b2] {
        let events = connection.settle().await;
        let messages = private_messages(&events);
        assert_eq!(messages.len(), 1, "{} copies", messages.len());
        assert_eq!(messages[0].content, "hello bob");
        assert_eq!(messages[0].sender_username, "alice");
        assert_eq!(messages[0].recipient_username, "bob");
    }
    assert!(private_messages(&c1.settle().await).is_empty());

    app.stop().await;
}

#[tokio::test]
async fn test_sender_gets_single_confirmation() {
    let app = TestApp::started();
    let mut a1 = app.connect(&alice()).await;
    let mut a2 = app.connect(&alice()).await;
    let _b = app.connect(&bob()).await;

    app.send(&a1, &bob(), "hi").await;

    assert_eq!(system_messages(&a1.settle().await), vec!["Message sent to bob."]);
    // The other tab gets the echo but not the confirmation.
    let events = a2.settle().await;
    assert!(system_messages(&events).is_empty());
    assert_eq!(private_messages(&events).len(), 1);

    app.stop().await;
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let app = TestApp::started();
    let a = app.connect(&alice()).await;
    let mut b = app.connect(&bob()).await;

    for i in 0..20 {
        app.send(&a, &bob(), &format!("m{}", i)).await;
    }

    for i in 0..20 {
        assert_eq!(b.next_message().await.content, format!("m{}", i));
    }

    app.stop().await;
}

#[tokio::test]
async fn test_offline_recipient_gets_no_backlog() {
    let app = TestApp::started();
    let mut a1 = app.connect(&alice()).await;
    let mut a2 = app.connect(&alice()).await;

    app.send(&a1, &bob(), "are you there?").await;
    assert_eq!(a1.next_system_message().await, "Message sent to bob.");
    assert_eq!(a2.next_message().await.content, "are you there?");

    let mut b = app.connect(&bob()).await;
    assert!(private_messages(&b.settle().await).is_empty());

    app.stop().await;
}

#[tokio::test]
async fn test_invalid_content_reported_without_publish() {
    let app = TestApp::started();
    let mut a = app.connect(&alice()).await;

    app.send(&a, &bob(), "").await;
    app.send(&a, &bob(), &"x".repeat(4001)).await;

    assert_eq!(
        system_messages(&a.settle().await),
        vec![
            "Error: Message content is invalid.",
            "Error: Message content is invalid."
        ]
    );
    assert_eq!(app.broker.published_count(Topic::ChatMessages), 0);

    app.stop().await;
}

#[tokio::test]
async fn test_broker_outage_reported_to_sender() {
    let app = TestApp::new();
    let mut a = app.connect(&alice()).await;
    a.drain();

    app.broker.set_unavailable(true);
    app.send(&a, &bob(), "hi").await;

    assert_eq!(
        system_messages(&a.drain()),
        vec!["Error: Message could not be delivered."]
    );
}
