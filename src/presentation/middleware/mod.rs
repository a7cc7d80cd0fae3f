//! Middleware
//!
//! Connection authentication and request tracing.

pub mod auth;
pub mod logging;

pub use auth::{extract_token, Claims, IdentityProvider, JwtIdentityProvider};
