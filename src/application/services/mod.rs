//! Application Services
//!
//! ## Available Services
//!
//! - **ConnectionRegistry**: identity to live-connection map, source of presence
//! - **RelayGateway**: connection lifecycle and `sendPrivateMessage`
//! - **RelayConsumer**: reads the broker and fans records out to connections

pub mod connection_registry;
pub mod relay_consumer;
pub mod relay_gateway;

pub use connection_registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, DeliveryOutcome};
pub use relay_consumer::{DeliveryReport, RecordOutcome, RelayConsumer};
pub use relay_gateway::RelayGateway;
