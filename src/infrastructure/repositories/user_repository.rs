//! User Directory (PostgreSQL)
//!
//! Read-only PostgreSQL implementation of the `Directory` trait.
//! Expects a `users` table with at least `id` and `username` columns.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{Directory, Identity, UserId};
use crate::shared::error::AppError;

/// Database row representation of the directory columns the relay needs.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
}

impl UserRow {
    /// Convert database row to a domain identity.
    fn into_identity(self) -> Identity {
        Identity::new(self.id, self.username)
    }
}

/// PostgreSQL user directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new PgUserDirectory with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgUserDirectory {
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id::text AS id, username
            FROM users
            WHERE id::text = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_identity))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
