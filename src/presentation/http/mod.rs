//! HTTP Surface
//!
//! Router and operational handlers.

pub mod handlers;
pub mod routes;
