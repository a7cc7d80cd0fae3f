//! # Domain Entities
//!
//! Core records the relay moves around.
//!
//! - **Identity**: a directory-issued user reference (id + username)
//! - **ChatMessage**: a one-to-one message on the `chat-messages` channel
//! - **PresenceEvent**: an online/offline delta on the `online-status` channel
//! - **RelayEvent**: what a live connection receives
//!
//! The `Directory` trait is defined here and implemented in the
//! infrastructure layer.

mod event;
mod identity;
mod message;
mod presence;

pub use event::RelayEvent;
pub use identity::{Directory, Identity, UserId};
#[cfg(test)]
pub use identity::MockDirectory;
pub use message::{wire_time, ChatMessage, MessageClock, WireRecord};
pub use presence::{OnlineUser, PresenceEvent, PresenceTransition};
