//! Source of destinations for the dispatcher.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{DestinationEntry, DestinationRow};

/// Supplies destinations with decoded configuration
#[async_trait]
pub trait DestinationRegistry: Send + Sync {
    /// Active destinations in a stable order. Rows with unusable
    /// configuration are returned as [`DestinationEntry::Invalid`].
    async fn list_active(&self) -> AppResult<Vec<DestinationEntry>>;

    /// Looks up one destination regardless of its active flag
    async fn get(&self, id: i32) -> AppResult<Option<DestinationEntry>>;
}

/// Registry backed by the `destinations` table
pub struct PgDestinationRegistry {
    pool: PgPool,
}

impl PgDestinationRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DestinationRegistry for PgDestinationRegistry {
    async fn list_active(&self) -> AppResult<Vec<DestinationEntry>> {
        let rows = sqlx::query_as::<_, DestinationRow>(
            r#"
            SELECT id, name, destination_type, config, filters, active,
                   created_at, updated_at
            FROM destinations
            WHERE active = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DestinationRow::into_entry).collect())
    }

    async fn get(&self, id: i32) -> AppResult<Option<DestinationEntry>> {
        let row = sqlx::query_as::<_, DestinationRow>(
            r#"
            SELECT id, name, destination_type, config, filters, active,
                   created_at, updated_at
            FROM destinations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DestinationRow::into_entry))
    }
}
