//! WebSocket Message Types
//!
//! Gateway frame formats: `{"op", "d", "s", "t"}`.

use serde::{Deserialize, Serialize};

use crate::domain::RelayEvent;

/// Name of the only client invocation
pub const SEND_PRIVATE_MESSAGE: &str = "sendPrivateMessage";

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Event dispatch
    Dispatch = 0,
    /// Heartbeat
    Heartbeat = 1,
    /// Client invocation
    Invoke = 2,
    /// Hello
    Hello = 10,
    /// Heartbeat ACK
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u64(op: u64) -> Option<Self> {
        match op {
            0 => Some(OpCode::Dispatch),
            1 => Some(OpCode::Heartbeat),
            2 => Some(OpCode::Invoke),
            10 => Some(OpCode::Hello),
            11 => Some(OpCode::HeartbeatAck),
            _ => None,
        }
    }
}

/// Incoming gateway message
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub op: u64,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

/// Outgoing gateway message
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self {
            op: OpCode::Hello as u8,
            d: Some(serde_json::json!(HelloPayload { heartbeat_interval })),
            s: None,
            t: None,
        }
    }

    pub fn heartbeat_ack() -> Self {
        Self {
            op: OpCode::HeartbeatAck as u8,
            d: None,
            s: None,
            t: None,
        }
    }

    pub fn dispatch(event: &RelayEvent, sequence: u64) -> Self {
        Self {
            op: OpCode::Dispatch as u8,
            d: Some(event.to_json()),
            s: Some(sequence),
            t: Some(event.event_name().to_string()),
        }
    }
}

/// Hello payload (op 10)
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}
