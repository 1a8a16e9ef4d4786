//! Database migration system
//!
//! Runs migrations on startup and tracks applied versions in a
//! `_migrations` table.

use sqlx::{PgPool, Row};
use tracing::info;

use crate::Result;

/// Migration record tracking applied migrations
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// Ordered list of schema migrations
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "create_scheduling_tables",
    r#"
    DO $$ BEGIN
        CREATE TYPE job_type AS ENUM ('http', 'webhook', 'script', 'email', 'custom');
    EXCEPTION WHEN duplicate_object THEN NULL; END $$;

    DO $$ BEGIN
        CREATE TYPE schedule_type AS ENUM ('immediate', 'scheduled', 'recurring');
    EXCEPTION WHEN duplicate_object THEN NULL; END $$;

    DO $$ BEGIN
        CREATE TYPE job_status AS ENUM ('active', 'paused', 'completed', 'failed', 'cancelled');
    EXCEPTION WHEN duplicate_object THEN NULL; END $$;

    DO $$ BEGIN
        CREATE TYPE retry_backoff AS ENUM ('fixed', 'exponential');
    EXCEPTION WHEN duplicate_object THEN NULL; END $$;

    DO $$ BEGIN
        CREATE TYPE execution_status AS ENUM
            ('pending', 'running', 'completed', 'failed', 'cancelled', 'timeout');
    EXCEPTION WHEN duplicate_object THEN NULL; END $$;

    DO $$ BEGIN
        CREATE TYPE log_level AS ENUM ('debug', 'info', 'warn', 'error');
    EXCEPTION WHEN duplicate_object THEN NULL; END $$;

    CREATE TABLE IF NOT EXISTS owners (
        id UUID PRIMARY KEY,
        email VARCHAR(255) NOT NULL UNIQUE,
        notify_on_completion BOOLEAN NOT NULL DEFAULT FALSE,
        notify_on_failure BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS jobs (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL REFERENCES owners(id) ON DELETE CASCADE,
        name VARCHAR(255) NOT NULL,
        description TEXT,
        tags TEXT[] NOT NULL DEFAULT '{}',
        metadata JSONB NOT NULL DEFAULT '{}',
        job_type job_type NOT NULL,
        payload JSONB NOT NULL DEFAULT '{}',
        schedule_type schedule_type NOT NULL,
        scheduled_at TIMESTAMPTZ,
        cron_expression VARCHAR(255),
        timezone VARCHAR(64) NOT NULL DEFAULT 'UTC',
        status job_status NOT NULL DEFAULT 'active',
        priority INTEGER NOT NULL DEFAULT 5,
        max_retries INTEGER NOT NULL DEFAULT 3,
        retry_delay_ms BIGINT NOT NULL DEFAULT 5000,
        retry_backoff retry_backoff NOT NULL DEFAULT 'exponential',
        timeout_ms BIGINT NOT NULL DEFAULT 300000,
        last_executed_at TIMESTAMPTZ,
        next_execution_at TIMESTAMPTZ,
        total_executions BIGINT NOT NULL DEFAULT 0,
        successful_executions BIGINT NOT NULL DEFAULT 0,
        failed_executions BIGINT NOT NULL DEFAULT 0,
        end_at TIMESTAMPTZ,
        max_executions BIGINT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS job_executions (
        id UUID PRIMARY KEY,
        job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
        status execution_status NOT NULL DEFAULT 'pending',
        attempt INTEGER NOT NULL DEFAULT 1,
        started_at TIMESTAMPTZ,
        completed_at TIMESTAMPTZ,
        duration_ms BIGINT,
        result JSONB,
        error JSONB,
        is_retry BOOLEAN NOT NULL DEFAULT FALSE,
        previous_execution_id UUID REFERENCES job_executions(id) ON DELETE SET NULL,
        worker_id VARCHAR(128),
        envelope_id UUID NOT NULL,
        input JSONB NOT NULL DEFAULT '{}',
        output JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS job_logs (
        id UUID PRIMARY KEY,
        job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
        execution_id UUID REFERENCES job_executions(id) ON DELETE SET NULL,
        level log_level NOT NULL DEFAULT 'info',
        message TEXT NOT NULL,
        data JSONB NOT NULL DEFAULT '{}',
        timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS idx_jobs_owner ON jobs(owner_id);
    CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
    CREATE INDEX IF NOT EXISTS idx_jobs_next_execution ON jobs(next_execution_at);
    CREATE INDEX IF NOT EXISTS idx_executions_job_status ON job_executions(job_id, status);
    CREATE INDEX IF NOT EXISTS idx_executions_created ON job_executions(created_at);
    CREATE INDEX IF NOT EXISTS idx_executions_envelope ON job_executions(envelope_id);
    CREATE INDEX IF NOT EXISTS idx_logs_job_timestamp ON job_logs(job_id, timestamp);
    "#,
)];

/// Database migration manager
pub struct Migrator {
    pool: PgPool,
}

impl Migrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn init_migration_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get list of applied migrations
    pub async fn applied(&self) -> Result<Vec<Migration>> {
        let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Migration {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect())
    }

    /// Apply every pending migration
    pub async fn run(&self) -> Result<usize> {
        self.init_migration_table().await?;

        let applied: Vec<i64> = self.applied().await?.iter().map(|m| m.version).collect();
        let mut count = 0;

        for &(version, name, sql) in MIGRATIONS {
            if applied.contains(&version) {
                continue;
            }

            info!(version, name, "applying migration");
            sqlx::raw_sql(sql).execute(&self.pool).await?;

            sqlx::query("INSERT INTO _migrations (version, name) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(version)
                .bind(name)
                .execute(&self.pool)
                .await?;
            count += 1;
        }

        if count > 0 {
            info!(count, "migrations applied");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::db::create_pool;

    // Requires a local Postgres; no-ops when none is reachable.
    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let config = StoreConfig::default();
        if let Ok(pool) = create_pool(&config).await {
            let migrator = Migrator::new(pool);
            migrator.run().await.unwrap();
            // Second run applies nothing
            assert_eq!(migrator.run().await.unwrap(), 0);
        }
    }
}
