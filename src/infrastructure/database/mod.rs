//! Database Module
//!
//! PostgreSQL connection pool for the user directory.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DirectorySettings;
use crate::shared::error::AppError;

/// Create a PostgreSQL connection pool
pub async fn create_pool(settings: &DirectorySettings) -> Result<PgPool, AppError> {
    let url = settings
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Internal("directory.database_url is not set".into()))?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(url)
        .await?;
    Ok(pool)
}
