//! WebSocket Session Management

use std::time::{Duration, Instant};

use crate::application::services::ConnectionId;
use crate::domain::Identity;

/// Lifecycle of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Upgrade done, not yet registered
    Connecting,
    Open,
    Closed,
}

/// WebSocket session state
#[derive(Debug)]
pub struct SessionState {
    pub identity: Identity,
    pub connection_id: ConnectionId,
    pub phase: ConnectionPhase,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(identity: Identity, connection_id: ConnectionId) -> Self {
        Self {
            identity,
            connection_id,
            phase: ConnectionPhase::Connecting,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn open(&mut self) {
        self.phase = ConnectionPhase::Open;
        self.heartbeat();
    }

    pub fn close(&mut self) {
        self.phase = ConnectionPhase::Closed;
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout_ms: u64) -> bool {
        self.last_heartbeat.elapsed().as_millis() < timeout_ms as u128
    }
}

/// Liveness checks per heartbeat timeout
const CHECKS_PER_TIMEOUT: u32 = 4;

/// How often to check a session against `timeout`.
///
/// A silent client is dropped at most one period after its timeout.
pub fn liveness_check_period(timeout: Duration) -> Duration {
    (timeout / CHECKS_PER_TIMEOUT).max(Duration::from_millis(10))
}

/// Per-connection dispatch sequence, starting at 1.
#[derive(Debug, Default)]
pub struct Sequence(u64);

impl Sequence {
    pub fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}
