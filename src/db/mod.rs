use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

pub type DbPool = PgPool;

/// Schema for destinations, webhook events and deliveries
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the pool backing the destination registry and the event log
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    log::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // received_at / delivered_at are stored as UTC
                sqlx::query("SET timezone = 'UTC'").execute(conn).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await?;

    log::info!(
        "Database pool ready (max: {}, min: {})",
        config.max_connections,
        config.min_connections
    );

    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("Applying {} migration(s)...", MIGRATOR.iter().count());
    MIGRATOR.run(pool).await?;
    log::info!("Database schema is up to date");
    Ok(())
}

/// True when the database answers a trivial query
pub async fn health_check(pool: &DbPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            log::debug!("Database health check failed: {}", e);
            false
        }
    }
}
