//! Relay Consumer
//!
//! Reads both broker topics and pushes records to live connections on this
//! node. One task per topic keeps each topic's order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::connection_registry::{ConnectionHandle, ConnectionRegistry, DeliveryOutcome};
use crate::domain::{ChatMessage, PresenceEvent, RelayEvent, WireRecord};
use crate::infrastructure::broker::{BrokerClient, BrokerRecord, Topic};
use crate::infrastructure::metrics;

/// Tally of one record's fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub timed_out: usize,
    pub closed: usize,
}

impl DeliveryReport {
    fn add(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::TimedOut => self.timed_out += 1,
            DeliveryOutcome::Closed => self.closed += 1,
        }
    }

    pub fn attempted(&self) -> usize {
        self.delivered + self.timed_out + self.closed
    }
}

/// What happened to one consumed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Relayed(DeliveryReport),
    /// Payload did not decode; the record is dropped
    Malformed,
}

pub struct RelayConsumer {
    registry: Arc<ConnectionRegistry>,
    broker: Arc<dyn BrokerClient>,
    delivery_timeout: Duration,
    read_retry_backoff: Duration,
}

impl RelayConsumer {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broker: Arc<dyn BrokerClient>,
        delivery_timeout: Duration,
        read_retry_backoff: Duration,
    ) -> Self {
        Self {
            registry,
            broker,
            delivery_timeout,
            read_retry_backoff,
        }
    }

    /// Start one reader task per topic.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        Topic::ALL
            .into_iter()
            .map(|topic| {
                let consumer = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { consumer.run(topic, cancel).await })
            })
            .collect()
    }

    /// Read loop for one topic. Returns once `cancel` fires.
    ///
    /// A record is acknowledged only after its fan-out finished, and the loop
    /// never stops halfway through a record.
    pub async fn run(&self, topic: Topic, cancel: CancellationToken) {
        tracing::info!(topic = %topic, "Relay consumer started");

        'read: while !cancel.is_cancelled() {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.broker.poll(topic) => polled,
            };

            let records = match polled {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "Broker read failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.read_retry_backoff) => continue,
                    }
                }
            };

            for record in records {
                self.handle_record(topic, &record).await;
                if let Err(e) = self.broker.ack(topic, &record.id).await {
                    tracing::warn!(topic = %topic, record_id = %record.id, error = %e, "Ack failed");
                }
                if cancel.is_cancelled() {
                    break 'read;
                }
            }
        }

        tracing::info!(topic = %topic, "Relay consumer stopped");
    }

    /// Decode one record and fan it out.
    pub async fn handle_record(&self, topic: Topic, record: &BrokerRecord) -> RecordOutcome {
        let outcome = match topic {
            Topic::ChatMessages => match ChatMessage::decode(&record.payload) {
                Ok(message) => RecordOutcome::Relayed(self.relay_message(message).await),
                Err(e) => {
                    self.log_malformed(topic, record, &e);
                    RecordOutcome::Malformed
                }
            },
            Topic::OnlineStatus => match PresenceEvent::decode(&record.payload) {
                Ok(event) => {
                    tracing::debug!(
                        user_id = %event.user_id,
                        is_online = event.is_online,
                        "Presence change received"
                    );
                    RecordOutcome::Relayed(self.broadcast_online_users().await)
                }
                Err(e) => {
                    self.log_malformed(topic, record, &e);
                    RecordOutcome::Malformed
                }
            },
        };

        let label = match outcome {
            RecordOutcome::Relayed(_) => "relayed",
            RecordOutcome::Malformed => "malformed",
        };
        metrics::record_consumed(topic.as_str(), label);
        outcome
    }

    /// Push a message to every live connection of its sender and recipient.
    pub async fn relay_message(&self, message: ChatMessage) -> DeliveryReport {
        let mut seen = HashSet::new();
        let targets: Vec<ConnectionHandle> = self
            .registry
            .connections_for(&message.recipient_id)
            .into_iter()
            .chain(self.registry.connections_for(&message.sender_id))
            .filter(|handle| seen.insert(handle.id))
            .collect();

        if targets.is_empty() {
            tracing::debug!(message_id = %message.id, "No live connections, message dropped");
            return DeliveryReport::default();
        }

        let message_id = message.id.clone();
        let report = self.fan_out(targets, RelayEvent::PrivateMessage(message)).await;
        tracing::debug!(
            message_id = %message_id,
            delivered = report.delivered,
            dropped = report.attempted() - report.delivered,
            "Message relayed"
        );
        report
    }

    /// Push the current online list to every live connection.
    pub async fn broadcast_online_users(&self) -> DeliveryReport {
        let online = self.registry.online_identities();
        let targets = self.registry.all_connections();
        self.fan_out(targets, RelayEvent::OnlineUsers(online)).await
    }

    async fn fan_out(&self, targets: Vec<ConnectionHandle>, event: RelayEvent) -> DeliveryReport {
        let deliveries = targets
            .iter()
            .map(|handle| handle.deliver(event.clone(), self.delivery_timeout));

        let mut report = DeliveryReport::default();
        for (handle, outcome) in targets.iter().zip(join_all(deliveries).await) {
            metrics::record_delivery(outcome.as_str());
            if outcome == DeliveryOutcome::TimedOut {
                tracing::warn!(
                    connection_id = %handle.id,
                    user_id = %handle.user_id,
                    event = event.event_name(),
                    "Delivery timed out, event dropped"
                );
            }
            report.add(outcome);
        }
        report
    }

    fn log_malformed(&self, topic: Topic, record: &BrokerRecord, error: &serde_json::Error) {
        tracing::warn!(
            topic = %topic,
            record_id = %record.id,
            error = %error,
            "RecordDecodeFailure: dropping malformed record"
        );
    }
}
