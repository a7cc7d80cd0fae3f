//! Relay Gateway
//!
//! Entry point for connection lifecycle and client invocations. The gateway
//! never pushes chat messages itself; it publishes records and lets the relay
//! consumer fan them out.

use std::sync::Arc;
use std::time::Duration;

use validator::Validate;

use super::connection_registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::application::dto::SendPrivateMessageRequest;
use crate::config::RelaySettings;
use crate::domain::{
    ChatMessage, Directory, Identity, MessageClock, PresenceEvent, PresenceTransition, RelayEvent,
    UserId, WireRecord,
};
use crate::infrastructure::broker::{BrokerClient, Topic};
use crate::infrastructure::metrics;
use crate::shared::error::{BrokerError, RelayError};
use crate::shared::validation::validation_error;

pub struct RelayGateway {
    registry: Arc<ConnectionRegistry>,
    broker: Arc<dyn BrokerClient>,
    directory: Arc<dyn Directory>,
    settings: RelaySettings,
    clock: MessageClock,
}

impl RelayGateway {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broker: Arc<dyn BrokerClient>,
        directory: Arc<dyn Directory>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            registry,
            broker,
            directory,
            settings,
            clock: MessageClock::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.delivery_timeout_ms)
    }

    /// Register a freshly opened connection.
    ///
    /// Announces the identity when this is its first connection, then sends
    /// the current online list to the new connection.
    pub async fn on_open(&self, identity: &Identity, handle: ConnectionHandle) -> PresenceTransition {
        let transition = self.registry.add(identity, handle.clone());
        tracing::info!(
            user_id = %identity.user_id,
            connection_id = %handle.id,
            connections = self.registry.connection_count(&identity.user_id),
            "Connection opened"
        );

        if transition == PresenceTransition::CameOnline {
            self.publish_presence(PresenceEvent::online(identity)).await;
        }

        let snapshot = RelayEvent::OnlineUsers(self.registry.online_identities());
        let outcome = handle.deliver(snapshot, self.delivery_timeout()).await;
        metrics::record_delivery(outcome.as_str());

        transition
    }

    /// Deregister a closed connection, announcing the identity going offline
    /// when it was the last one.
    pub async fn on_close(&self, identity: &Identity, connection_id: ConnectionId) -> PresenceTransition {
        let transition = self.registry.remove(&identity.user_id, connection_id);
        match transition {
            PresenceTransition::NotRegistered => {
                tracing::debug!(
                    user_id = %identity.user_id,
                    connection_id = %connection_id,
                    "Close for unregistered connection ignored"
                );
            }
            PresenceTransition::WentOffline => {
                tracing::info!(user_id = %identity.user_id, connection_id = %connection_id, "Connection closed, identity offline");
                self.publish_presence(PresenceEvent::offline(identity)).await;
            }
            _ => {
                tracing::info!(user_id = %identity.user_id, connection_id = %connection_id, "Connection closed");
            }
        }
        transition
    }

    /// Publish a private message on behalf of `sender`.
    ///
    /// Success means the record was accepted by the broker, not that anyone
    /// received it.
    pub async fn send_private_message(
        &self,
        sender: &Identity,
        recipient_user_id: &str,
        content: &str,
    ) -> Result<ChatMessage, RelayError> {
        let sender = self.resolve_sender(sender).await?;

        let request = SendPrivateMessageRequest::new(recipient_user_id, content);
        request.validate().map_err(validation_error)?;

        let recipient = self.resolve_recipient(recipient_user_id).await?;

        let message = ChatMessage::new(&sender, &recipient, request.content, self.clock.now());
        let record_id = self.publish_message(&message).await?;

        tracing::debug!(
            message_id = %message.id,
            record_id = %record_id,
            sender_id = %message.sender_id,
            recipient_id = %message.recipient_id,
            "Message published"
        );

        Ok(message)
    }

    /// Handle a `sendPrivateMessage` invocation from a live connection.
    ///
    /// Exactly one system message is pushed back to `connection`, whatever
    /// the outcome.
    pub async fn invoke(
        &self,
        identity: &Identity,
        connection: &ConnectionHandle,
        request: SendPrivateMessageRequest,
    ) -> Result<ChatMessage, RelayError> {
        let result = self
            .send_private_message(identity, &request.recipient_user_id, &request.content)
            .await;

        let notice = match &result {
            Ok(message) => format!("Message sent to {}.", message.recipient_username),
            Err(e) => {
                tracing::warn!(
                    user_id = %identity.user_id,
                    connection_id = %connection.id,
                    error = %e,
                    "sendPrivateMessage rejected"
                );
                e.system_message().to_string()
            }
        };

        let outcome = connection
            .deliver(RelayEvent::SystemMessage(notice), self.delivery_timeout())
            .await;
        metrics::record_delivery(outcome.as_str());

        result
    }

    async fn resolve_sender(&self, sender: &Identity) -> Result<Identity, RelayError> {
        if !sender.is_complete() {
            return Err(RelayError::UnauthenticatedSender);
        }
        self.directory
            .find_by_id(&sender.user_id)
            .await?
            .ok_or(RelayError::UnauthenticatedSender)
    }

    async fn resolve_recipient(&self, recipient_user_id: &str) -> Result<Identity, RelayError> {
        let recipient_id = UserId::new(recipient_user_id.trim());
        if recipient_id.is_empty() {
            return Err(RelayError::UnknownRecipient(recipient_user_id.to_string()));
        }
        self.directory
            .find_by_id(&recipient_id)
            .await?
            .ok_or_else(|| RelayError::UnknownRecipient(recipient_user_id.to_string()))
    }

    async fn publish_message(&self, message: &ChatMessage) -> Result<String, BrokerError> {
        let payload = message.encode()?;
        let topic = Topic::ChatMessages;
        let attempts = self.settings.publish_retries + 1;
        let backoff = Duration::from_millis(self.settings.publish_retry_backoff_ms);

        let mut attempt = 1;
        loop {
            match self
                .broker
                .publish(topic, message.recipient_id.as_str(), &payload)
                .await
            {
                Ok(record_id) => {
                    metrics::record_publish(topic.as_str(), true);
                    return Ok(record_id);
                }
                Err(e) => {
                    metrics::record_publish(topic.as_str(), false);
                    if attempt >= attempts {
                        tracing::error!(message_id = %message.id, attempts, error = %e, "Message publish failed");
                        return Err(e);
                    }
                    tracing::warn!(message_id = %message.id, attempt, error = %e, "Message publish failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn publish_presence(&self, event: PresenceEvent) {
        let topic = Topic::OnlineStatus;
        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(user_id = %event.user_id, error = %e, "Failed to encode presence event");
                return;
            }
        };

        match self.broker.publish(topic, event.user_id.as_str(), &payload).await {
            Ok(_) => metrics::record_publish(topic.as_str(), true),
            Err(e) => {
                metrics::record_publish(topic.as_str(), false);
                tracing::warn!(
                    user_id = %event.user_id,
                    is_online = event.is_online,
                    error = %e,
                    "Presence publish failed"
                );
            }
        }
    }
}
