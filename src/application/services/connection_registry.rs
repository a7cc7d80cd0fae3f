//! Connection Registry
//!
//! Maps each identity to its live connections. Presence is derived from the
//! size of that set, so an identity with two tabs open stays online when one
//! of them closes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{Identity, OnlineUser, PresenceTransition, RelayEvent, UserId};
use crate::infrastructure::metrics;

/// Unique id of one live transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of pushing one event into a connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Queue stayed full for the whole delivery timeout; event dropped
    TimedOut,
    /// Connection's writer is gone
    Closed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::TimedOut => "timeout",
            DeliveryOutcome::Closed => "closed",
        }
    }
}

/// Sending side of a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    sender: mpsc::Sender<RelayEvent>,
}

impl ConnectionHandle {
    pub fn new(user_id: UserId, sender: mpsc::Sender<RelayEvent>) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            sender,
        }
    }

    /// Create a handle together with the receiver its writer drains.
    pub fn channel(user_id: UserId, capacity: usize) -> (Self, mpsc::Receiver<RelayEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(user_id, tx), rx)
    }

    /// Queue an event, giving up after `limit`.
    pub async fn deliver(&self, event: RelayEvent, limit: Duration) -> DeliveryOutcome {
        match tokio::time::timeout(limit, self.sender.send(event)).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(_)) => DeliveryOutcome::Closed,
            Err(_) => DeliveryOutcome::TimedOut,
        }
    }
}

struct IdentityEntry {
    identity: Identity,
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

/// Concurrent identity -> connections map.
///
/// Every mutation goes through the identity's map entry, which holds the
/// shard lock, so adds and removes for one identity are linearizable. An
/// entry exists only while it has at least one connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    identities: DashMap<UserId, IdentityEntry>,
    total: AtomicUsize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection for an identity.
    pub fn add(&self, identity: &Identity, handle: ConnectionHandle) -> PresenceTransition {
        let transition = match self.identities.entry(identity.user_id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get_mut().connections.insert(handle.id, handle).is_none() {
                    self.total.fetch_add(1, Ordering::SeqCst);
                }
                PresenceTransition::AlreadyOnline
            }
            Entry::Vacant(entry) => {
                let mut connections = HashMap::new();
                connections.insert(handle.id, handle);
                entry.insert(IdentityEntry {
                    identity: identity.clone(),
                    connections,
                });
                self.total.fetch_add(1, Ordering::SeqCst);
                PresenceTransition::CameOnline
            }
        };
        self.update_gauges();
        transition
    }

    /// Deregister a connection.
    pub fn remove(&self, user_id: &UserId, connection_id: ConnectionId) -> PresenceTransition {
        let transition = match self.identities.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get_mut().connections.remove(&connection_id).is_none() {
                    return PresenceTransition::NotRegistered;
                }
                self.total.fetch_sub(1, Ordering::SeqCst);
                if entry.get().connections.is_empty() {
                    entry.remove();
                    PresenceTransition::WentOffline
                } else {
                    PresenceTransition::StillOnline
                }
            }
            Entry::Vacant(_) => return PresenceTransition::NotRegistered,
        };
        self.update_gauges();
        transition
    }

    /// Live connections of one identity.
    pub fn connections_for(&self, user_id: &UserId) -> Vec<ConnectionHandle> {
        self.identities
            .get(user_id)
            .map(|entry| entry.connections.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connection_ids_for(&self, user_id: &UserId) -> HashSet<ConnectionId> {
        self.identities
            .get(user_id)
            .map(|entry| entry.connections.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self, user_id: &UserId) -> usize {
        self.identities
            .get(user_id)
            .map(|entry| entry.connections.len())
            .unwrap_or(0)
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.connection_count(user_id) > 0
    }

    /// Every online identity, sorted by username then id.
    pub fn online_identities(&self) -> Vec<OnlineUser> {
        let mut online: Vec<OnlineUser> = self
            .identities
            .iter()
            .map(|entry| OnlineUser::from(&entry.identity))
            .collect();
        online.sort_by(|a, b| {
            a.username
                .cmp(&b.username)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        online
    }

    /// Snapshot of every live connection.
    pub fn all_connections(&self) -> Vec<ConnectionHandle> {
        self.identities
            .iter()
            .flat_map(|entry| entry.connections.values().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn total_connections(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn online_count(&self) -> usize {
        self.identities.len()
    }

    fn update_gauges(&self) {
        metrics::set_connection_gauges(self.total_connections(), self.online_count());
    }
}
