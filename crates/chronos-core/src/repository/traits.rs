//! Repository traits for store abstraction
//!
//! These traits define the interface the planner and workers depend on;
//! the Postgres implementations are the production store, the in-memory
//! ones back tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Execution, Job, JobFilter, JobLog, Owner};
use crate::Result;

/// Job rows - the single source of truth for job state
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job row
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    /// Overwrite scheduling fields and status. Never used for counters;
    /// those belong to `finalize_attempt`.
    async fn update(&self, job: &Job) -> Result<()>;

    /// Delete a job, cascading its executions and logs
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// List jobs matching a filter
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Atomically persist a terminal attempt outcome: the execution row
    /// and the job's counters/status/schedule fields move together.
    /// Counters are applied as increments. Returns false (and writes
    /// nothing) when the execution is already terminal, which makes
    /// redelivered finalizes no-ops.
    async fn finalize_attempt(&self, job: &Job, execution: &Execution) -> Result<bool>;
}

/// Attempt records
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert(&self, execution: &Execution) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Execution>>;

    /// Overwrite a non-terminal row (worker adoption of a redelivered
    /// envelope)
    async fn update(&self, execution: &Execution) -> Result<()>;

    /// The attempt opened for a given envelope delivery, if any
    async fn find_by_envelope(&self, envelope_id: Uuid) -> Result<Option<Execution>>;

    /// Attempts for a job, newest first
    async fn list_for_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<Execution>>;

    /// Whether the job has an attempt currently running
    async fn has_running(&self, job_id: Uuid) -> Result<bool>;
}

/// Append-only audit lines
#[async_trait]
pub trait JobLogStore: Send + Sync {
    async fn append(&self, log: &JobLog) -> Result<()>;

    /// Log lines for a job, newest first
    async fn list_for_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<JobLog>>;

    /// Retention: drop lines older than the cutoff, returning the count
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Job owners
#[async_trait]
pub trait OwnerStore: Send + Sync {
    async fn insert(&self, owner: &Owner) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Owner>>;

    /// Delete an owner, cascading their jobs
    async fn delete(&self, id: Uuid) -> Result<bool>;
}
