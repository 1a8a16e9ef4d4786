use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Execution;
use crate::repository::traits::ExecutionStore;
use crate::Result;

#[derive(Clone)]
pub struct PostgresExecutionRepository {
    pool: PgPool,
}

impl PostgresExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PostgresExecutionRepository {
    async fn insert(&self, execution: &Execution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_executions (
                id, job_id, status, attempt, started_at, completed_at,
                duration_ms, result, error, is_retry,
                previous_execution_id, worker_id, envelope_id, input,
                output, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16)
            "#,
        )
        .bind(execution.id)
        .bind(execution.job_id)
        .bind(execution.status)
        .bind(execution.attempt)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(execution.duration_ms)
        .bind(&execution.result)
        .bind(&execution.error)
        .bind(execution.is_retry)
        .bind(execution.previous_execution_id)
        .bind(&execution.worker_id)
        .bind(execution.envelope_id)
        .bind(&execution.input)
        .bind(&execution.output)
        .bind(execution.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Execution>> {
        let execution =
            sqlx::query_as::<_, Execution>("SELECT * FROM job_executions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(execution)
    }

    async fn update(&self, execution: &Execution) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_executions SET
                status = $2, started_at = $3, worker_id = $4
            WHERE id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(execution.id)
        .bind(execution.status)
        .bind(execution.started_at)
        .bind(&execution.worker_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_envelope(&self, envelope_id: Uuid) -> Result<Option<Execution>> {
        let execution = sqlx::query_as::<_, Execution>(
            "SELECT * FROM job_executions WHERE envelope_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(envelope_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(execution)
    }

    async fn list_for_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<Execution>> {
        let executions = sqlx::query_as::<_, Execution>(
            r#"
            SELECT * FROM job_executions
            WHERE job_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(executions)
    }

    async fn has_running(&self, job_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_executions WHERE job_id = $1 AND status = 'running'",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}
