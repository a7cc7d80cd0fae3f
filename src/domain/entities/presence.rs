//! Presence records.
//!
//! `PresenceEvent` is a delta published on `online-status`; the authoritative
//! online set always comes from the connection registry.

use serde::{Deserialize, Serialize};

use super::identity::{Identity, UserId};
use super::message::WireRecord;

/// Online/offline notification for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub user_id: UserId,
    pub username: String,
    pub is_online: bool,
}

impl PresenceEvent {
    pub fn online(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            is_online: true,
        }
    }

    pub fn offline(identity: &Identity) -> Self {
        Self {
            is_online: false,
            ..Self::online(identity)
        }
    }
}

impl WireRecord for PresenceEvent {}

/// Entry of the online list pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    pub username: String,
}

impl From<&Identity> for OnlineUser {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
        }
    }
}

/// Effect of a registry mutation on an identity's presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// First live connection for the identity
    CameOnline,
    /// Identity already had a live connection
    AlreadyOnline,
    /// Identity still has other live connections
    StillOnline,
    /// Last live connection closed
    WentOffline,
    /// The connection was not registered
    NotRegistered,
}
