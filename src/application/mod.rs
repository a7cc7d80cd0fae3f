//! Application Layer
//!
//! Relay services and the DTOs they accept. This layer sits between the
//! WebSocket transport and the broker/directory adapters.

pub mod dto;
pub mod services;
