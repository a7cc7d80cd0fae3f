//! # Chat Relay Library
//!
//! A presence-aware, one-to-one real-time messaging relay:
//! - WebSocket gateway for authenticated client connections
//! - Redis Streams as the durable log between gateway and consumers
//! - Reference-counted presence derived from live connections
//! - PostgreSQL or in-memory user directory
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Identities, messages, presence records, directory trait
//! - **Application Layer**: Connection registry, relay gateway, relay consumer
//! - **Infrastructure Layer**: Broker, directory and metrics implementations
//! - **Presentation Layer**: HTTP handlers and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! chat_relay/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities and traits
//! +-- application/    Relay services and DTOs
//! +-- infrastructure/ Broker, directory and metrics implementations
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core records and traits
pub mod domain;

// Application layer - Relay services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
