//! In-memory store implementing every repository trait, with the same
//! finalize idempotency as the Postgres implementation. Backs unit and
//! scenario tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Execution, ExecutionStatus, Job, JobFilter, JobLog, Owner};
use crate::repository::traits::{ExecutionStore, JobLogStore, JobStore, OwnerStore};
use crate::{Error, Result};

#[derive(Default)]
struct Inner {
    owners: HashMap<Uuid, Owner>,
    jobs: HashMap<Uuid, Job>,
    executions: HashMap<Uuid, Execution>,
    logs: Vec<JobLog>,
}

/// Single-process store; cheap to clone handles via Arc at call sites
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages logged for a job, oldest first, for assertions
    pub fn log_messages(&self, job_id: Uuid) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .logs
            .iter()
            .filter(|log| log.job_id == job_id)
            .map(|log| log.message.clone())
            .collect()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.get_mut(&job.id) {
            Some(existing) => {
                // Counters stay with the stored row; update() is a
                // planner operation and must not clobber them
                let total = existing.total_executions;
                let successful = existing.successful_executions;
                let failed = existing.failed_executions;
                *existing = job.clone();
                existing.total_executions = total;
                existing.successful_executions = successful;
                existing.failed_executions = failed;
                Ok(())
            }
            None => Err(Error::not_found(format!("job {}", job.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.jobs.remove(&id).is_some();
        if removed {
            inner.executions.retain(|_, execution| execution.job_id != id);
            inner.logs.retain(|log| log.job_id != id);
        }
        Ok(removed)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|job| {
                filter.owner_id.map_or(true, |owner| job.owner_id == owner)
                    && filter.status.map_or(true, |status| job.status == status)
                    && filter
                        .schedule_type
                        .map_or(true, |st| job.schedule_type == st)
                    && filter.job_type.map_or(true, |jt| job.job_type == jt)
                    && filter
                        .tag
                        .as_ref()
                        .map_or(true, |tag| job.tags.contains(tag))
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0);
        let jobs: Vec<Job> = jobs.into_iter().skip(offset).collect();
        let mut jobs = jobs;
        if let Some(limit) = filter.limit {
            jobs.truncate(limit);
        }
        Ok(jobs)
    }

    async fn finalize_attempt(&self, job: &Job, execution: &Execution) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();

        let stored = inner
            .executions
            .get(&execution.id)
            .ok_or_else(|| Error::not_found(format!("execution {}", execution.id)))?;
        if stored.status.is_terminal() {
            return Ok(false);
        }

        inner.executions.insert(execution.id, execution.clone());

        let stored_job = inner
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| Error::not_found(format!("job {}", job.id)))?;
        stored_job.total_executions += 1;
        if execution.status == ExecutionStatus::Completed {
            stored_job.successful_executions += 1;
        } else {
            stored_job.failed_executions += 1;
        }
        stored_job.last_executed_at = job.last_executed_at;
        stored_job.status = job.status;
        stored_job.next_execution_at = job.next_execution_at;
        stored_job.updated_at = execution.completed_at.unwrap_or(stored_job.updated_at);

        Ok(true)
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn insert(&self, execution: &Execution) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Execution>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.executions.get(&id).cloned())
    }

    async fn update(&self, execution: &Execution) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.executions.get_mut(&execution.id) {
            if !stored.status.is_terminal() {
                *stored = execution.clone();
            }
        }
        Ok(())
    }

    async fn find_by_envelope(&self, envelope_id: Uuid) -> Result<Option<Execution>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .executions
            .values()
            .filter(|execution| execution.envelope_id == envelope_id)
            .max_by_key(|execution| execution.created_at)
            .cloned())
    }

    async fn list_for_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<Execution>> {
        let inner = self.inner.lock().unwrap();
        let mut executions: Vec<Execution> = inner
            .executions
            .values()
            .filter(|execution| execution.job_id == job_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.attempt.cmp(&a.attempt)));
        executions.truncate(limit as usize);
        Ok(executions)
    }

    async fn has_running(&self, job_id: Uuid) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.executions.values().any(|execution| {
            execution.job_id == job_id && execution.status == ExecutionStatus::Running
        }))
    }
}

#[async_trait]
impl JobLogStore for MemoryStore {
    async fn append(&self, log: &JobLog) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.logs.push(log.clone());
        Ok(())
    }

    async fn list_for_job(&self, job_id: Uuid, limit: i64) -> Result<Vec<JobLog>> {
        let inner = self.inner.lock().unwrap();
        let mut logs: Vec<JobLog> = inner
            .logs
            .iter()
            .filter(|log| log.job_id == job_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit as usize);
        Ok(logs)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.logs.len();
        inner.logs.retain(|log| log.timestamp >= cutoff);
        Ok((before - inner.logs.len()) as u64)
    }
}

#[async_trait]
impl OwnerStore for MemoryStore {
    async fn insert(&self, owner: &Owner) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.owners.insert(owner.id, owner.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Owner>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.owners.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.owners.remove(&id).is_some();
        if removed {
            let job_ids: Vec<Uuid> = inner
                .jobs
                .values()
                .filter(|job| job.owner_id == id)
                .map(|job| job.id)
                .collect();
            for job_id in job_ids {
                inner.jobs.remove(&job_id);
                inner.executions.retain(|_, execution| execution.job_id != job_id);
                inner.logs.retain(|log| log.job_id != job_id);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::test_job;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_job_crud() {
        let store = MemoryStore::new();
        let job = test_job();

        JobStore::insert(&store, &job).await.unwrap();
        let loaded = JobStore::get(&store, job.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "test");

        assert!(JobStore::delete(&store, job.id).await.unwrap());
        assert!(JobStore::get(&store, job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_preserves_counters() {
        let store = MemoryStore::new();
        let mut job = test_job();
        JobStore::insert(&store, &job).await.unwrap();

        // Simulate a finalize having bumped counters
        let execution = Execution::start(
            job.id,
            Uuid::new_v4(),
            1,
            None,
            "w",
            serde_json::json!({}),
            now(),
        );
        ExecutionStore::insert(&store, &execution).await.unwrap();
        let mut done = execution.clone();
        done.mark_completed(serde_json::json!({}), now());
        JobStore::finalize_attempt(&store, &job, &done).await.unwrap();

        // A planner update built from a stale copy must not reset them
        job.description = Some("changed".into());
        JobStore::update(&store, &job).await.unwrap();

        let loaded = JobStore::get(&store, job.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_executions, 1);
        assert_eq!(loaded.successful_executions, 1);
        assert_eq!(loaded.description.as_deref(), Some("changed"));
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let store = MemoryStore::new();
        let job = test_job();
        JobStore::insert(&store, &job).await.unwrap();

        let execution = Execution::start(
            job.id,
            Uuid::new_v4(),
            1,
            None,
            "w",
            serde_json::json!({}),
            now(),
        );
        ExecutionStore::insert(&store, &execution).await.unwrap();

        let mut done = execution.clone();
        done.mark_completed(serde_json::json!({"ok": true}), now());

        assert!(JobStore::finalize_attempt(&store, &job, &done).await.unwrap());
        // Second finalize of the same attempt is a no-op
        assert!(!JobStore::finalize_attempt(&store, &job, &done).await.unwrap());

        let loaded = JobStore::get(&store, job.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_executions, 1);
        assert_eq!(loaded.successful_executions, 1);
        assert_eq!(loaded.failed_executions, 0);
    }

    #[tokio::test]
    async fn test_owner_cascade() {
        let store = MemoryStore::new();
        let owner = Owner::new("ops@example.com", now());
        OwnerStore::insert(&store, &owner).await.unwrap();

        let mut job = test_job();
        job.owner_id = owner.id;
        JobStore::insert(&store, &job).await.unwrap();

        OwnerStore::delete(&store, owner.id).await.unwrap();
        assert!(JobStore::get(&store, job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_retention() {
        let store = MemoryStore::new();
        let job_id = Uuid::new_v4();
        store
            .append(&JobLog::info(job_id, "old", now() - chrono::Duration::days(20)))
            .await
            .unwrap();
        store
            .append(&JobLog::info(job_id, "fresh", now()))
            .await
            .unwrap();

        let pruned = store
            .prune_older_than(now() - chrono::Duration::days(14))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        let remaining = JobLogStore::list_for_job(&store, job_id, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "fresh");
    }
}
