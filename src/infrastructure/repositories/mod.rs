//! Directory Implementations
//!
//! Concrete implementations of the `Directory` trait defined in the domain layer.

mod memory_directory;
mod user_repository;

pub use memory_directory::InMemoryDirectory;
pub use user_repository::PgUserDirectory;

use std::sync::Arc;

use crate::config::{DirectoryBackend, DirectorySettings};
use crate::domain::Directory;
use crate::infrastructure::database;
use crate::shared::error::AppError;

/// Build the directory selected by configuration.
pub async fn create_directory(settings: &DirectorySettings) -> Result<Arc<dyn Directory>, AppError> {
    match settings.backend {
        DirectoryBackend::Memory => {
            let directory = InMemoryDirectory::from_seed(&settings.seed_users);
            tracing::info!(users = directory.len(), "In-memory directory seeded");
            Ok(Arc::new(directory))
        }
        DirectoryBackend::Postgres => {
            let pool = database::create_pool(settings).await?;
            tracing::info!("Directory connection pool created");
            Ok(Arc::new(PgUserDirectory::new(pool)))
        }
    }
}
