use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Execution, Job, JobFilter};
use crate::repository::traits::JobStore;
use crate::Result;

#[derive(Clone)]
pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PostgresJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, owner_id, name, description, tags, metadata,
                job_type, payload, schedule_type, scheduled_at,
                cron_expression, timezone, status, priority, max_retries,
                retry_delay_ms, retry_backoff, timeout_ms,
                last_executed_at, next_execution_at, total_executions,
                successful_executions, failed_executions, end_at,
                max_executions, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22,
                    $23, $24, $25, $26, $27)
            "#,
        )
        .bind(job.id)
        .bind(job.owner_id)
        .bind(&job.name)
        .bind(&job.description)
        .bind(&job.tags)
        .bind(&job.metadata)
        .bind(job.job_type)
        .bind(&job.payload)
        .bind(job.schedule_type)
        .bind(job.scheduled_at)
        .bind(&job.cron_expression)
        .bind(&job.timezone)
        .bind(job.status)
        .bind(job.priority)
        .bind(job.max_retries)
        .bind(job.retry_delay_ms)
        .bind(job.retry_backoff)
        .bind(job.timeout_ms)
        .bind(job.last_executed_at)
        .bind(job.next_execution_at)
        .bind(job.total_executions)
        .bind(job.successful_executions)
        .bind(job.failed_executions)
        .bind(job.end_at)
        .bind(job.max_executions)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn update(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                name = $2, description = $3, tags = $4, metadata = $5,
                payload = $6, schedule_type = $7, scheduled_at = $8,
                cron_expression = $9, timezone = $10, status = $11,
                priority = $12, max_retries = $13, retry_delay_ms = $14,
                retry_backoff = $15, timeout_ms = $16, end_at = $17,
                max_executions = $18, next_execution_at = $19,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.description)
        .bind(&job.tags)
        .bind(&job.metadata)
        .bind(&job.payload)
        .bind(job.schedule_type)
        .bind(job.scheduled_at)
        .bind(&job.cron_expression)
        .bind(&job.timezone)
        .bind(job.status)
        .bind(job.priority)
        .bind(job.max_retries)
        .bind(job.retry_delay_ms)
        .bind(job.retry_backoff)
        .bind(job.timeout_ms)
        .bind(job.end_at)
        .bind(job.max_executions)
        .bind(job.next_execution_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::job_status IS NULL OR status = $2)
              AND ($3::schedule_type IS NULL OR schedule_type = $3)
              AND ($4::job_type IS NULL OR job_type = $4)
              AND ($5::text IS NULL OR $5 = ANY(tags))
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(filter.owner_id)
        .bind(filter.status)
        .bind(filter.schedule_type)
        .bind(filter.job_type)
        .bind(&filter.tag)
        .bind(filter.limit.map(|l| l as i64).unwrap_or(100))
        .bind(filter.offset.map(|o| o as i64).unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn finalize_attempt(&self, job: &Job, execution: &Execution) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Lock the attempt row; a terminal record means another worker
        // already finalized this envelope
        let current: Option<String> = sqlx::query_scalar(
            "SELECT status::text FROM job_executions WHERE id = $1 FOR UPDATE",
        )
        .bind(execution.id)
        .fetch_optional(&mut *tx)
        .await?;

        match current.as_deref() {
            None => {
                tx.rollback().await?;
                return Err(crate::Error::not_found(format!(
                    "execution {}",
                    execution.id
                )));
            }
            Some("completed") | Some("failed") | Some("cancelled") | Some("timeout") => {
                tx.rollback().await?;
                return Ok(false);
            }
            Some(_) => {}
        }

        sqlx::query(
            r#"
            UPDATE job_executions SET
                status = $2, completed_at = $3, duration_ms = $4,
                result = $5, error = $6, output = $7
            WHERE id = $1
            "#,
        )
        .bind(execution.id)
        .bind(execution.status)
        .bind(execution.completed_at)
        .bind(execution.duration_ms)
        .bind(&execution.result)
        .bind(&execution.error)
        .bind(&execution.output)
        .execute(&mut *tx)
        .await?;

        // Counters are increments so concurrent finalizes of other jobs
        // and planner status writes cannot lose updates
        let succeeded = execution.status == crate::models::ExecutionStatus::Completed;
        sqlx::query(
            r#"
            UPDATE jobs SET
                total_executions = total_executions + 1,
                successful_executions = successful_executions + $2,
                failed_executions = failed_executions + $3,
                last_executed_at = $4,
                status = $5,
                next_execution_at = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(if succeeded { 1i64 } else { 0i64 })
        .bind(if succeeded { 0i64 } else { 1i64 })
        .bind(job.last_executed_at)
        .bind(job.status)
        .bind(job.next_execution_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
