//! Append-only log of inbound events and their delivery outcomes.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::DispatchSummary;

/// Persists dispatch summaries
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, summary: &DispatchSummary) -> AppResult<()>;
}

/// Recorder writing to `webhook_events` and `deliveries`
pub struct PgEventRecorder {
    pool: PgPool,
}

impl PgEventRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRecorder for PgEventRecorder {
    async fn record(&self, summary: &DispatchSummary) -> AppResult<()> {
        let metadata = &summary.metadata;
        let mut tx = self.pool.begin().await?;

        let event_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO webhook_events (
                platform, event_type, project, author, branch,
                envelope_status, stage, rejection,
                success_count, failure_count, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(metadata.platform.map(|p| p.as_str()))
        .bind(&metadata.event_type)
        .bind(&metadata.project)
        .bind(&metadata.author)
        .bind(&metadata.branch)
        .bind(summary.envelope_status.as_str())
        .bind(summary.stage.as_str())
        .bind(&summary.rejection)
        .bind(summary.succeeded() as i32)
        .bind(summary.failed() as i32)
        .bind(summary.received_at)
        .fetch_one(&mut *tx)
        .await?;

        for result in &summary.per_destination {
            sqlx::query(
                r#"
                INSERT INTO deliveries (
                    event_id, destination_id, destination_name, destination_type,
                    status, error_detail, http_status, attempts, delivered_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(event_id)
            .bind(result.destination_id)
            .bind(&result.destination_name)
            .bind(result.destination_type.map(|t| t.to_string()))
            .bind(result.status.as_str())
            .bind(&result.error_detail)
            .bind(result.http_status.map(i32::from))
            .bind(result.attempts as i32)
            .bind(result.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        log::debug!(
            "Recorded event {} with {} delivery result(s)",
            event_id,
            summary.per_destination.len()
        );
        Ok(())
    }
}
