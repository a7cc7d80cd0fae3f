//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Durable log brokers (Redis Streams, in-memory)
//! - User directories (PostgreSQL, in-memory)
//! - Prometheus metrics

pub mod broker;
pub mod database;
pub mod metrics;
pub mod repositories;
