//! Redis Streams broker.
//!
//! Each topic is one stream (`{prefix}{topic}`). Records are appended with
//! `XADD` (trimmed with `MAXLEN ~`), read through a consumer group with
//! `XREADGROUP ... BLOCK`, and acknowledged with `XACK`.
//!
//! On the first reads after connecting, each topic replays this consumer's
//! pending entries (delivered but never acknowledged) before switching to new
//! entries, so a crash between delivery and `XACK` does not lose records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use parking_lot::Mutex;
use redis::{AsyncCommands, Client};
use tracing::{debug, info, instrument, warn};

use super::{BrokerClient, BrokerRecord, Topic};
use crate::config::BrokerSettings;
use crate::shared::error::BrokerError;

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";
const NEW_ENTRIES: &str = ">";

/// Where the next `XREADGROUP` for a topic starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCursor {
    /// Replaying this consumer's pending entries after the given id.
    Pending(String),
    /// Reading entries never delivered to the group.
    Live,
}

impl ReadCursor {
    /// Start of the pending list.
    pub fn replay() -> Self {
        Self::Pending("0".to_string())
    }

    pub fn read_id(&self) -> &str {
        match self {
            Self::Pending(after) => after,
            Self::Live => NEW_ENTRIES,
        }
    }

    /// Move past the ids just read. An empty pending read ends the replay.
    pub fn advance(&mut self, ids: &[String]) {
        if let Self::Pending(after) = self {
            match ids.last() {
                Some(last) => *after = last.clone(),
                None => *self = Self::Live,
            }
        }
    }
}

/// Broker backed by Redis Streams consumer groups.
#[derive(Clone)]
pub struct RedisStreamBroker {
    publisher: ConnectionManager,
    /// Blocking reads get their own connection per topic so they never stall publishes.
    readers: HashMap<Topic, ConnectionManager>,
    cursors: Arc<Mutex<HashMap<Topic, ReadCursor>>>,
    settings: BrokerSettings,
}

impl RedisStreamBroker {
    /// Connect, then make sure both streams and the consumer group exist.
    #[instrument(skip(settings), fields(url = %settings.redis_url, group = %settings.consumer_group))]
    pub async fn connect(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        info!("Connecting to Redis...");
        let client = Client::open(settings.redis_url.as_str())?;
        let publisher = ConnectionManager::new(client.clone()).await?;

        let mut readers = HashMap::new();
        for topic in Topic::ALL {
            readers.insert(topic, ConnectionManager::new(client.clone()).await?);
        }

        let cursors = Topic::ALL
            .into_iter()
            .map(|topic| (topic, ReadCursor::replay()))
            .collect();

        let broker = Self {
            publisher,
            readers,
            cursors: Arc::new(Mutex::new(cursors)),
            settings: settings.clone(),
        };
        for topic in Topic::ALL {
            broker.ensure_group(topic).await?;
        }
        info!("Redis streams ready");
        Ok(broker)
    }

    fn stream_key(&self, topic: Topic) -> String {
        format!("{}{}", self.settings.stream_prefix, topic.as_str())
    }

    fn start_id(&self) -> &'static str {
        if self.settings.start_from_earliest {
            "0"
        } else {
            "$"
        }
    }

    fn reader(&self, topic: Topic) -> Result<ConnectionManager, BrokerError> {
        self.readers
            .get(&topic)
            .cloned()
            .ok_or_else(|| BrokerError::Unavailable(format!("no reader for {}", topic)))
    }

    fn cursor(&self, topic: Topic) -> ReadCursor {
        self.cursors
            .lock()
            .get(&topic)
            .cloned()
            .unwrap_or(ReadCursor::Live)
    }

    fn advance_cursor(&self, topic: Topic, ids: &[String]) {
        if let Some(cursor) = self.cursors.lock().get_mut(&topic) {
            let was_pending = matches!(cursor, ReadCursor::Pending(_));
            cursor.advance(ids);
            if was_pending && *cursor == ReadCursor::Live {
                debug!(topic = %topic, "Pending entries replayed");
            }
        }
    }

    /// Create the consumer group (and the stream) unless it already exists.
    async fn ensure_group(&self, topic: Topic) -> Result<(), BrokerError> {
        let mut conn = self.publisher.clone();
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(
                self.stream_key(topic),
                &self.settings.consumer_group,
                self.start_id(),
            )
            .await;

        match created {
            Ok(()) => {
                debug!(topic = %topic, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BrokerClient for RedisStreamBroker {
    async fn publish(&self, topic: Topic, key: &str, payload: &str) -> Result<String, BrokerError> {
        let mut conn = self.publisher.clone();
        let id: String = conn
            .xadd_maxlen(
                self.stream_key(topic),
                StreamMaxlen::Approx(self.settings.max_len),
                "*",
                &[(KEY_FIELD, key), (PAYLOAD_FIELD, payload)],
            )
            .await?;
        Ok(id)
    }

    async fn poll(&self, topic: Topic) -> Result<Vec<BrokerRecord>, BrokerError> {
        let mut conn = self.reader(topic)?;
        let cursor = self.cursor(topic);
        let options = StreamReadOptions::default()
            .group(&self.settings.consumer_group, &self.settings.consumer_name)
            .count(self.settings.batch_size)
            .block(self.settings.block_ms as usize);

        let reply: Result<Option<StreamReadReply>, redis::RedisError> = conn
            .xread_options(&[self.stream_key(topic)], &[cursor.read_id()], &options)
            .await;

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) if e.code() == Some("NOGROUP") => {
                // Stream was deleted under us; recreate and report the failed read.
                warn!(topic = %topic, "Consumer group missing, recreating");
                self.ensure_group(topic).await?;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<BrokerRecord> = reply
            .map(|reply| {
                reply
                    .keys
                    .into_iter()
                    .flat_map(|stream| stream.ids)
                    .map(|entry| BrokerRecord {
                        key: entry.get::<String>(KEY_FIELD).unwrap_or_default(),
                        payload: entry.get::<String>(PAYLOAD_FIELD).unwrap_or_default(),
                        id: entry.id,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let ReadCursor::Pending(_) = cursor {
            let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
            if !ids.is_empty() {
                info!(topic = %topic, count = ids.len(), "Redelivering pending entries");
            }
            self.advance_cursor(topic, &ids);
        }

        Ok(records)
    }

    async fn ack(&self, topic: Topic, record_id: &str) -> Result<(), BrokerError> {
        let mut conn = self.publisher.clone();
        let _: i64 = conn
            .xack(self.stream_key(topic), &self.settings.consumer_group, &[record_id])
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.publisher.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
