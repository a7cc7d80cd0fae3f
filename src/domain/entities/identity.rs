//! Identity entity and the directory trait.
//!
//! Identities are issued by an external directory; the relay only reads them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Stable, opaque user identifier issued by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A user reference: stable id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }

    /// Both the id and the name must be present for an identity to be usable.
    pub fn is_complete(&self) -> bool {
        !self.user_id.is_empty() && !self.username.trim().is_empty()
    }
}

/// Read-only access to the user directory.
///
/// Implemented in the infrastructure layer by an in-memory directory and a
/// PostgreSQL-backed one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// Find an identity by user id.
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<Identity>, AppError>;

    /// Check that the directory is reachable.
    async fn ping(&self) -> Result<(), AppError>;
}
