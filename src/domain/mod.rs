//! # Domain Layer
//!
//! Records and contracts of the relay, independent of transport and storage.
//!
//! ## Structure
//!
//! - **entities**: identities, chat messages, presence events, pushed events
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - The directory trait defines the identity lookup contract
//! - Wire formats live next to the records they encode

pub mod entities;

// Re-export commonly used types
pub use entities::*;
