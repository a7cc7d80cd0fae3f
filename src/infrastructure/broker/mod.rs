//! Broker Module
//!
//! Durable, ordered publish/subscribe transport between the gateway and the
//! relay consumer.
//!
//! This module provides:
//! - A `BrokerClient` trait abstracting publish, poll and acknowledge
//! - A `RedisStreamBroker` backed by Redis Streams and consumer groups
//! - A `MemoryBroker` for single-process deployments and tests
//!
//! # Architecture
//!
//! ```text
//! +-------------------+            +-------------------+
//! |   RelayGateway    |  publish   |   RelayConsumer   |
//! +-------------------+            +-------------------+
//!          |                                ^
//!          v                                | poll / ack
//! +---------------------------------------------------+
//! |               BrokerClient trait                  |
//! +---------------------------------------------------+
//!          |                                |
//!          v                                v
//! +-------------------+            +-------------------+
//! | RedisStreamBroker |            |   MemoryBroker    |
//! +-------------------+            +-------------------+
//! ```

mod memory;
mod redis_stream;

pub use memory::MemoryBroker;
pub use redis_stream::RedisStreamBroker;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BrokerBackend, BrokerSettings};
use crate::shared::error::BrokerError;

/// Logical channels of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Chat message records
    ChatMessages,
    /// Presence delta records
    OnlineStatus,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::ChatMessages, Topic::OnlineStatus];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::ChatMessages => "chat-messages",
            Topic::OnlineStatus => "online-status",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record read back from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    /// Broker-assigned position, used to acknowledge the record
    pub id: String,
    /// Partition key the record was published with
    pub key: String,
    /// Encoded JSON payload
    pub payload: String,
}

/// Durable publish/subscribe transport.
///
/// Each topic is ordered. `poll` is meant to be called by exactly one reader
/// per topic; records it returns stay pending until `ack`.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Append a record and return its broker id once durably accepted.
    async fn publish(&self, topic: Topic, key: &str, payload: &str) -> Result<String, BrokerError>;

    /// Wait up to the configured block time for the next batch of records.
    ///
    /// Returns an empty batch when nothing arrived.
    async fn poll(&self, topic: Topic) -> Result<Vec<BrokerRecord>, BrokerError>;

    /// Mark a record as processed.
    async fn ack(&self, topic: Topic, record_id: &str) -> Result<(), BrokerError>;

    /// Check that the broker is reachable.
    async fn ping(&self) -> Result<(), BrokerError>;
}

/// Build the broker selected by configuration.
pub async fn create_broker(settings: &BrokerSettings) -> Result<Arc<dyn BrokerClient>, BrokerError> {
    match settings.backend {
        BrokerBackend::Redis => Ok(Arc::new(RedisStreamBroker::connect(settings).await?)),
        BrokerBackend::Memory => Ok(Arc::new(MemoryBroker::new(
            settings.batch_size,
            std::time::Duration::from_millis(settings.block_ms),
        ))),
    }
}
