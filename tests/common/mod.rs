//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chat_relay::application::dto::SendPrivateMessageRequest;
use chat_relay::application::services::ConnectionHandle;
use chat_relay::config::Settings;
use chat_relay::domain::{ChatMessage, Identity, RelayEvent};
use chat_relay::infrastructure::broker::MemoryBroker;
use chat_relay::infrastructure::repositories::InMemoryDirectory;
use chat_relay::presentation::http::routes;
use chat_relay::presentation::middleware::Claims;
use chat_relay::startup::AppState;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// How long a test waits for an expected event
pub const EVENT_WAIT: Duration = Duration::from_secs(2);

pub fn alice() -> Identity {
    Identity::new("u-alice", "alice")
}

pub fn bob() -> Identity {
    Identity::new("u-bob", "bob")
}

pub fn carol() -> Identity {
    Identity::new("u-carol", "carol")
}

pub fn test_settings() -> Settings {
    Settings::from_overrides(&[
        ("jwt.secret", JWT_SECRET),
        ("broker.backend", "memory"),
        ("broker.read_retry_backoff_ms", "10"),
        ("relay.delivery_timeout_ms", "100"),
        ("relay.publish_retry_backoff_ms", "1"),
    ])
    .unwrap()
}

/// Signed access token for an identity
pub fn token_for(identity: &Identity) -> String {
    let claims = Claims {
        sub: identity.user_id.to_string(),
        name: identity.username.clone(),
        exp: chrono::Utc::now().timestamp() + 3600,
        iat: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Relay wired to an in-memory broker and directory
pub struct TestApp {
    pub state: AppState,
    pub broker: Arc<MemoryBroker>,
    pub directory: Arc<InMemoryDirectory>,
    cancel: CancellationToken,
    consumers: Vec<JoinHandle<()>>,
}

impl TestApp {
    /// Relay without consumers; records stay in the broker
    pub fn new() -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        for identity in [alice(), bob(), carol()] {
            directory.insert(identity);
        }
        let broker = Arc::new(MemoryBroker::new(64, Duration::from_millis(20)));
        let state = AppState::from_parts(test_settings(), broker.clone(), directory.clone());

        Self {
            state,
            broker,
            directory,
            cancel: CancellationToken::new(),
            consumers: Vec::new(),
        }
    }

    /// Relay with its consumers running
    pub fn started() -> Self {
        let mut app = Self::new();
        app.consumers = Arc::new(app.state.consumer()).spawn(app.cancel.clone());
        app
    }

    /// HTTP test server over the real router
    pub fn server(&self) -> TestServer {
        TestServer::new(routes::create_router(self.state.clone())).unwrap()
    }

    /// Test server over a real socket, needed for WebSocket upgrades
    pub fn ws_server(&self) -> TestServer {
        TestServer::builder()
            .http_transport()
            .build(routes::create_router(self.state.clone()))
            .unwrap()
    }

    /// Open a connection the way the WebSocket handler does
    pub async fn connect(&self, identity: &Identity) -> TestConnection {
        let (handle, rx) = ConnectionHandle::channel(
            identity.user_id.clone(),
            self.state.settings.relay.outbound_buffer,
        );
        self.state.gateway.on_open(identity, handle.clone()).await;
        TestConnection {
            identity: identity.clone(),
            handle,
            rx,
        }
    }

    pub async fn disconnect(&self, connection: &TestConnection) {
        self.state
            .gateway
            .on_close(&connection.identity, connection.handle.id)
            .await;
    }

    /// Invoke `sendPrivateMessage` from a connection
    pub async fn send(&self, from: &TestConnection, recipient: &Identity, content: &str) {
        let request = SendPrivateMessageRequest::new(recipient.user_id.as_str(), content);
        let _ = self
            .state
            .gateway
            .invoke(&from.identity, &from.handle, request)
            .await;
    }

    /// Stop the consumers and wait for them
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.consumers) {
            task.await.unwrap();
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Client side of one registered connection
pub struct TestConnection {
    pub identity: Identity,
    pub handle: ConnectionHandle,
    rx: mpsc::Receiver<RelayEvent>,
}

impl TestConnection {
    /// Next event, failing the test after `EVENT_WAIT`
    pub async fn next_event(&mut self) -> RelayEvent {
        tokio::time::timeout(EVENT_WAIT, self.rx.recv())
            .await
            .unwrap_or_else(|_| panic!("{} got no event", self.identity.username))
            .expect("connection queue closed")
    }

    /// Next private message, skipping presence and system events
    pub async fn next_message(&mut self) -> ChatMessage {
        loop {
            if let RelayEvent::PrivateMessage(message) = self.next_event().await {
                return message;
            }
        }
    }

    /// Next system message, skipping other events
    pub async fn next_system_message(&mut self) -> String {
        loop {
            if let RelayEvent::SystemMessage(text) = self.next_event().await {
                return text;
            }
        }
    }

    /// Wait until an online list with exactly these usernames arrives
    pub async fn wait_for_online(&mut self, expected: &[&str]) {
        loop {
            if let RelayEvent::OnlineUsers(users) = self.next_event().await {
                let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
                if names == expected {
                    return;
                }
            }
        }
    }

    /// Events queued right now
    pub fn drain(&mut self) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Let in-flight records settle, then return everything queued
    pub async fn settle(&mut self) -> Vec<RelayEvent> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        self.drain()
    }
}

pub fn private_messages(events: &[RelayEvent]) -> Vec<&ChatMessage> {
    events
        .iter()
        .filter_map(|event| match event {
            RelayEvent::PrivateMessage(message) => Some(message),
            _ => None,
        })
        .collect()
}

pub fn system_messages(events: &[RelayEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            RelayEvent::SystemMessage(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
