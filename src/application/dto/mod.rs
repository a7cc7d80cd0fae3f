//! Data Transfer Objects
//!
//! Payloads exchanged with connected clients.

pub mod request;

pub use request::{SendPrivateMessageRequest, MAX_CONTENT_LENGTH};
