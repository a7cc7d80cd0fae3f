//! Presentation Layer
//!
//! HTTP routes, the WebSocket relay endpoint and connection authentication.

pub mod http;
pub mod middleware;
pub mod websocket;
