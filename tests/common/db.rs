//! Database test utilities
//!
//! Provides helpers for setting up test databases with testcontainers.

use serde_json::Value;
use sqlx::PgPool;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;

/// A test database container with connection pool
pub struct TestDb {
    /// The running PostgreSQL container
    #[allow(dead_code)]
    container: ContainerAsync<Postgres>,
    /// Connection pool to the test database
    pub pool: PgPool,
}

impl TestDb {
    /// Creates a new test database with a fresh PostgreSQL container
    pub async fn new() -> Self {
        let container = Postgres::default()
            .start()
            .await
            .expect("Failed to start PostgreSQL container");

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        let database_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        gitrelay::db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        TestDb { container, pool }
    }

    /// Inserts a destination row and returns its id
    pub async fn insert_destination(
        &self,
        name: &str,
        destination_type: &str,
        config: Value,
        filters: Option<Value>,
        active: bool,
    ) -> i32 {
        sqlx::query_scalar(
            r#"
            INSERT INTO destinations (name, destination_type, config, filters, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(destination_type)
        .bind(config)
        .bind(filters)
        .bind(active)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert destination")
    }
}
