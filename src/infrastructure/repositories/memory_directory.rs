//! In-memory user directory.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::SeedUser;
use crate::domain::{Directory, Identity, UserId};
use crate::shared::error::AppError;

/// Directory held in memory, keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<UserId, Identity>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from configured seed users.
    pub fn from_seed(seed: &[SeedUser]) -> Self {
        let directory = Self::new();
        for user in seed {
            directory.insert(Identity::new(user.user_id.as_str(), user.username.as_str()));
        }
        directory
    }

    /// Add or replace an identity.
    pub fn insert(&self, identity: Identity) {
        self.users.insert(identity.user_id.clone(), identity);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<Identity>, AppError> {
        Ok(self.users.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
