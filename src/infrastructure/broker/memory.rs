//! In-process broker for single-node deployments and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{BrokerClient, BrokerRecord, Topic};
use crate::shared::error::BrokerError;

#[derive(Default)]
struct TopicLog {
    queue: Mutex<VecDeque<BrokerRecord>>,
    notify: Notify,
    published: AtomicU64,
}

/// Ordered in-memory log with one queue per topic.
///
/// Records are handed out once, in publish order. Acknowledgement is a no-op.
pub struct MemoryBroker {
    topics: HashMap<Topic, TopicLog>,
    batch_size: usize,
    block: Duration,
    sequence: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryBroker {
    pub fn new(batch_size: usize, block: Duration) -> Self {
        let topics = Topic::ALL
            .into_iter()
            .map(|topic| (topic, TopicLog::default()))
            .collect();
        Self {
            topics,
            batch_size: batch_size.max(1),
            block,
            sequence: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    fn log(&self, topic: Topic) -> &TopicLog {
        // Every topic is inserted in `new`.
        &self.topics[&topic]
    }

    /// Simulate an outage: publishes and polls fail while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Records published to a topic since creation.
    pub fn published_count(&self, topic: Topic) -> u64 {
        self.log(topic).published.load(Ordering::SeqCst)
    }

    /// Records published but not yet polled.
    pub fn pending(&self, topic: Topic) -> Vec<BrokerRecord> {
        self.log(topic).queue.lock().iter().cloned().collect()
    }

    fn check_available(&self) -> Result<(), BrokerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("memory broker offline".into()));
        }
        Ok(())
    }

    fn drain(&self, log: &TopicLog) -> Vec<BrokerRecord> {
        let mut queue = log.queue.lock();
        let take = queue.len().min(self.batch_size);
        queue.drain(..take).collect()
    }
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    async fn publish(&self, topic: Topic, key: &str, payload: &str) -> Result<String, BrokerError> {
        self.check_available()?;
        let id = format!("{}-0", self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        let log = self.log(topic);
        log.queue.lock().push_back(BrokerRecord {
            id: id.clone(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        log.published.fetch_add(1, Ordering::SeqCst);
        log.notify.notify_one();
        Ok(id)
    }

    async fn poll(&self, topic: Topic) -> Result<Vec<BrokerRecord>, BrokerError> {
        self.check_available()?;
        let log = self.log(topic);
        let batch = self.drain(log);
        if !batch.is_empty() {
            return Ok(batch);
        }
        // notify_one stores a permit, so a publish between drain and here is not lost.
        let _ = tokio::time::timeout(self.block, log.notify.notified()).await;
        Ok(self.drain(log))
    }

    async fn ack(&self, _topic: Topic, _record_id: &str) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        self.check_available()
    }
}
