//! Events pushed to a live connection.

use serde::{Deserialize, Serialize};

use super::message::ChatMessage;
use super::presence::OnlineUser;

/// Push surface of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum RelayEvent {
    #[serde(rename = "receivePrivateMessage")]
    PrivateMessage(ChatMessage),
    #[serde(rename = "receiveOnlineUsers")]
    OnlineUsers(Vec<OnlineUser>),
    #[serde(rename = "receiveSystemMessage")]
    SystemMessage(String),
}

impl RelayEvent {
    /// Get the event name for dispatch
    pub fn event_name(&self) -> &'static str {
        match self {
            RelayEvent::PrivateMessage(_) => "receivePrivateMessage",
            RelayEvent::OnlineUsers(_) => "receiveOnlineUsers",
            RelayEvent::SystemMessage(_) => "receiveSystemMessage",
        }
    }

    /// Payload as JSON for the dispatch frame
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RelayEvent::PrivateMessage(m) => serde_json::to_value(m).unwrap_or_default(),
            RelayEvent::OnlineUsers(u) => serde_json::to_value(u).unwrap_or_default(),
            RelayEvent::SystemMessage(s) => serde_json::Value::String(s.clone()),
        }
    }
}
