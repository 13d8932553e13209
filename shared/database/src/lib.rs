pub mod migrations;
pub mod postgres;
pub mod repositories;

pub use postgres::{create_postgres_pool, health_check as postgres_health_check, PostgresPool};
pub use repositories::*;

use anyhow::Result;
use mrf_utils::DatabaseConfig;
use std::time::Duration;

/// Connects the pool and, unless disabled, applies the schema.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<PostgresPool> {
    let pool = create_postgres_pool(
        &config.url,
        config.max_connections,
        Duration::from_secs(config.connection_timeout_seconds),
    )
    .await?;

    if config.run_migrations {
        migrations::run_postgres_migrations(&pool).await?;
    }

    Ok(pool)
}
