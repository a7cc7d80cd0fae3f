//! HTTP Handlers
//!
//! Operational endpoints. Relay traffic itself goes over the WebSocket.

pub mod health;
