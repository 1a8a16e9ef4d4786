//! Database access utilities

pub mod migrate;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::Result;

/// Create the Postgres connection pool from store configuration
pub async fn create_pool(config: &StoreConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.pool.max)
        .min_connections(config.pool.min)
        .acquire_timeout(Duration::from_secs(config.pool.acquire_secs))
        .idle_timeout(Duration::from_secs(config.pool.idle_secs))
        .connect(&config.url())
        .await?;

    Ok(pool)
}
