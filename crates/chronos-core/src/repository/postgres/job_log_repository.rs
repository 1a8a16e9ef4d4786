use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::JobLog;
use crate::repository::traits::JobLogStore;
use crate::Result;

#[derive(Clone)]
pub struct PostgresJobLogRepository {
    pool: PgPool,
}

impl PostgresJobLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLogStore for PostgresJobLogRepository {
    async fn append(&self, log: &JobLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_logs (id, job_id, execution_id, level, message, data, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(log.job_id)
        .bind(log.execution_id)
        .bind(log.level)
        .bind(&log.message)
        .bind(&log.data)
        .bind(log.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<JobLog>> {
        let logs = sqlx::query_as::<_, JobLog>(
            r#"
            SELECT * FROM job_logs
            WHERE job_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM job_logs WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
