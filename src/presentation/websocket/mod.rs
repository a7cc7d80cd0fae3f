//! WebSocket Gateway
//!
//! Real-time connection endpoint for relay clients.

pub mod handler;
pub mod messages;
pub mod session;

pub use handler::ws_handler;
pub use messages::{GatewayReceive, GatewaySend, OpCode};
pub use session::{liveness_check_period, ConnectionPhase, Sequence, SessionState};
