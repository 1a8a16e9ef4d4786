//! Scheduling planner
//!
//! Translates user intents (create, trigger, pause, resume, reschedule,
//! cancel, delete) into store mutations and queue operations, computes
//! `next_execution_at`, and evaluates recurring end conditions. The
//! planner owns repeatable registrations and never mutates job
//! counters; those belong to the worker's finalize step.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::JobSettings;
use crate::error::{Error, Result};
use crate::models::{
    CreateJobRequest, Job, JobLog, JobStatus, RescheduleRequest, ScheduleType,
};
use crate::queue::{Envelope, PriorityBand, ReadyQueue, RepeatableRegistration};
use crate::repository::{ExecutionStore, JobLogStore, JobStore};
use crate::schedule::CalendarEngine;

pub struct Planner {
    jobs: Arc<dyn JobStore>,
    executions: Arc<dyn ExecutionStore>,
    logs: Arc<dyn JobLogStore>,
    queue: Arc<dyn ReadyQueue>,
    calendar: CalendarEngine,
    clock: Arc<dyn Clock>,
    defaults: JobSettings,
}

impl Planner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        executions: Arc<dyn ExecutionStore>,
        logs: Arc<dyn JobLogStore>,
        queue: Arc<dyn ReadyQueue>,
        clock: Arc<dyn Clock>,
        defaults: JobSettings,
    ) -> Self {
        Self {
            jobs,
            executions,
            logs,
            queue,
            calendar: CalendarEngine::new(),
            clock,
            defaults,
        }
    }

    /// Validate a request, persist the job row and register it with the
    /// ready queue
    pub async fn create(&self, request: CreateJobRequest) -> Result<Job> {
        let now = self.clock.now();
        request.validate(now)?;

        if request.schedule_type == ScheduleType::Recurring {
            let expression = request.cron_expression.as_deref().unwrap_or_default();
            self.calendar.validate(expression)?;
            self.calendar.parse_timezone(&request.timezone)?;
        }

        let mut job = self.build_job(request, now);
        job.next_execution_at = match job.schedule_type {
            ScheduleType::Immediate => Some(now),
            ScheduleType::Scheduled => job.scheduled_at,
            ScheduleType::Recurring => {
                let expression = job.cron_expression.as_deref().unwrap_or_default();
                let next = self
                    .calendar
                    .next(expression, &job.timezone, now)?
                    .ok_or_else(|| Error::invalid_schedule("expression never fires"))?;
                Some(next)
            }
        };

        self.jobs.insert(&job).await?;
        self.register(&job, now).await?;

        info!(job_id = %job.id, schedule = %job.schedule_type, "job created");
        self.log(&job, format!("created ({})", job.schedule_type)).await;
        Ok(job)
    }

    /// Enqueue a one-shot attempt at the highest priority tier. Does not
    /// advance `next_execution_at`; allowed only on active jobs.
    pub async fn trigger(&self, job_id: Uuid) -> Result<Job> {
        let job = self.get(job_id).await?;
        self.require_status(&job, JobStatus::Active, "trigger")?;

        let now = self.clock.now();
        self.queue
            .enqueue(Envelope::new(job.id, now), PriorityBand::Critical)
            .await?;

        info!(job_id = %job.id, "job manually triggered");
        self.log(&job, "manually triggered").await;
        Ok(job)
    }

    /// Withdraw pending/delayed envelopes and the repeatable entry, then
    /// park the job. In-flight attempts complete naturally.
    pub async fn pause(&self, job_id: Uuid) -> Result<Job> {
        let mut job = self.get(job_id).await?;
        self.require_status(&job, JobStatus::Active, "pause")?;

        self.queue.remove_job(job.id).await?;
        job.status = JobStatus::Paused;
        job.next_execution_at = None;
        self.jobs.update(&job).await?;

        info!(job_id = %job.id, "job paused");
        self.log(&job, "paused").await;
        Ok(job)
    }

    /// Reactivate a paused job, recomputing `next_execution_at` from the
    /// current instant and re-registering with the queue
    pub async fn resume(&self, job_id: Uuid) -> Result<Job> {
        let mut job = self.get(job_id).await?;
        self.require_status(&job, JobStatus::Paused, "resume")?;

        let now = self.clock.now();
        job.status = JobStatus::Active;
        job.next_execution_at = match job.schedule_type {
            ScheduleType::Immediate => Some(now),
            // A one-shot instant already in the past fires right away
            ScheduleType::Scheduled => Some(job.scheduled_at.unwrap_or(now).max(now)),
            ScheduleType::Recurring => {
                let expression = job.cron_expression.as_deref().unwrap_or_default();
                self.calendar.next(expression, &job.timezone, now)?
            }
        };
        self.register(&job, now).await?;
        self.jobs.update(&job).await?;

        info!(job_id = %job.id, next = ?job.next_execution_at, "job resumed");
        self.log(&job, "resumed").await;
        Ok(job)
    }

    /// Move the job onto a new one-shot or recurring schedule; the
    /// paused/active state is preserved
    pub async fn reschedule(&self, job_id: Uuid, request: RescheduleRequest) -> Result<Job> {
        let mut job = self.get(job_id).await?;
        if job.status.is_terminal() {
            return Err(Error::illegal_transition(format!(
                "cannot reschedule job in {} state",
                job.status
            )));
        }

        let now = self.clock.now();
        self.queue.remove_job(job.id).await?;

        match request {
            RescheduleRequest::At(at) => {
                if at <= now {
                    return Err(Error::invalid_schedule("scheduled_at must be in the future"));
                }
                job.schedule_type = ScheduleType::Scheduled;
                job.scheduled_at = Some(at);
                job.cron_expression = None;
                job.next_execution_at = Some(at);
            }
            RescheduleRequest::Cron {
                expression,
                timezone,
            } => {
                self.calendar.validate(&expression)?;
                self.calendar.parse_timezone(&timezone)?;
                let next = self
                    .calendar
                    .next(&expression, &timezone, now)?
                    .ok_or_else(|| Error::invalid_schedule("expression never fires"))?;
                job.schedule_type = ScheduleType::Recurring;
                job.cron_expression = Some(expression);
                job.timezone = timezone;
                job.scheduled_at = None;
                job.next_execution_at = Some(next);
            }
        }

        // Paused jobs keep their new schedule dormant until resume
        if job.status == JobStatus::Active {
            self.register(&job, now).await?;
        } else {
            job.next_execution_at = None;
        }
        self.jobs.update(&job).await?;

        info!(job_id = %job.id, schedule = %job.schedule_type, "job rescheduled");
        self.log(&job, format!("rescheduled ({})", job.schedule_type)).await;
        Ok(job)
    }

    /// Withdraw queue entries and mark the job cancelled. Idempotent on
    /// already-terminal jobs.
    pub async fn cancel(&self, job_id: Uuid) -> Result<Job> {
        let mut job = self.get(job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }

        self.queue.remove_job(job.id).await?;
        job.status = JobStatus::Cancelled;
        job.next_execution_at = None;
        self.jobs.update(&job).await?;

        info!(job_id = %job.id, "job cancelled");
        self.log(&job, "cancelled").await;
        Ok(job)
    }

    /// Cancel, then remove persistent state (executions and logs
    /// cascade)
    pub async fn delete(&self, job_id: Uuid) -> Result<()> {
        self.cancel(job_id).await?;
        self.jobs.delete(job_id).await?;
        info!(job_id = %job_id, "job deleted");
        Ok(())
    }

    /// Post-attempt advance for recurring jobs: recompute
    /// `next_execution_at` and evaluate end conditions. Invoked by the
    /// worker pipeline after a terminal, non-retrying attempt; `job`
    /// carries the attempt's counter increments already applied.
    pub async fn advance_recurring(&self, job: &mut Job) -> Result<()> {
        let now = self.clock.now();

        if job.end_condition_reached(now) {
            job.status = JobStatus::Completed;
            job.next_execution_at = None;
            self.queue.remove_repeatable(job.id).await?;
            info!(job_id = %job.id, "recurring job reached end condition");
            self.log(job, "completed (end condition reached)").await;
            return Ok(());
        }

        let expression = job.cron_expression.as_deref().unwrap_or_default();
        job.next_execution_at = self.calendar.next(expression, &job.timezone, now)?;
        Ok(())
    }

    /// Materialize envelopes for due repeatable registrations. Fires
    /// that would overlap a still-running attempt are skipped.
    pub async fn run_due_repeatables(&self) -> Result<usize> {
        let now = self.clock.now();
        let due = self.queue.due_repeatables(now).await?;
        let mut fired = 0;

        for registration in due {
            let Some(job) = self.jobs.get(registration.job_id).await? else {
                // Job row is gone; drop the orphaned registration
                self.queue.remove_repeatable(registration.job_id).await?;
                continue;
            };
            if job.status != JobStatus::Active {
                continue;
            }

            let next = self
                .calendar
                .next(&registration.cron_expression, &registration.timezone, now)?
                .unwrap_or(now + chrono::Duration::days(365));

            if self.executions.has_running(job.id).await? {
                warn!(job_id = %job.id, "skipping overlapping recurring fire");
                self.log(&job, "skipped_overlap").await;
            } else {
                self.queue
                    .enqueue(Envelope::new(job.id, now), job.priority_band())
                    .await?;
                fired += 1;
            }

            self.queue.advance_repeatable(job.id, next).await?;
        }

        Ok(fired)
    }

    /// Retention pass over the audit log
    pub async fn prune_logs(&self, retain: chrono::Duration) -> Result<u64> {
        let cutoff = self.clock.now() - retain;
        self.logs.prune_older_than(cutoff).await
    }

    async fn get(&self, job_id: Uuid) -> Result<Job> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("job {}", job_id)))
    }

    fn require_status(&self, job: &Job, expected: JobStatus, action: &str) -> Result<()> {
        if job.status != expected {
            return Err(Error::illegal_transition(format!(
                "cannot {} job in {} state",
                action, job.status
            )));
        }
        Ok(())
    }

    /// Queue registration rules shared by create, resume and reschedule
    async fn register(&self, job: &Job, now: DateTime<Utc>) -> Result<()> {
        match job.schedule_type {
            ScheduleType::Immediate => {
                self.queue
                    .enqueue(Envelope::new(job.id, now), job.priority_band())
                    .await
            }
            ScheduleType::Scheduled => {
                let visible_at = job.scheduled_at.unwrap_or(now).max(now);
                self.queue
                    .enqueue_delayed(Envelope::new(job.id, now), job.priority_band(), visible_at)
                    .await
            }
            ScheduleType::Recurring => {
                let next_fire_at = job
                    .next_execution_at
                    .ok_or_else(|| Error::invalid_schedule("expression never fires"))?;
                self.queue
                    .register_repeatable(RepeatableRegistration {
                        job_id: job.id,
                        cron_expression: job.cron_expression.clone().unwrap_or_default(),
                        timezone: job.timezone.clone(),
                        next_fire_at,
                    })
                    .await
            }
        }
    }

    fn build_job(&self, request: CreateJobRequest, now: DateTime<Utc>) -> Job {
        Job {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            name: request.name,
            description: request.description,
            tags: request.tags,
            metadata: request.metadata,
            job_type: request.job_type,
            payload: request.payload,
            schedule_type: request.schedule_type,
            scheduled_at: request.scheduled_at,
            cron_expression: request.cron_expression,
            timezone: request.timezone,
            status: JobStatus::Active,
            priority: request.priority,
            max_retries: request
                .max_retries
                .unwrap_or(self.defaults.max_retry_attempts as i32),
            retry_delay_ms: request
                .retry_delay_ms
                .unwrap_or(self.defaults.retry_delay_ms as i64),
            retry_backoff: request.retry_backoff,
            timeout_ms: request.timeout_ms.unwrap_or(self.defaults.timeout_ms as i64),
            last_executed_at: None,
            next_execution_at: None,
            total_executions: 0,
            successful_executions: 0,
            failed_executions: 0,
            end_at: request.end_at,
            max_executions: request.max_executions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Audit-log append; store failures must not fail the operation
    async fn log(&self, job: &Job, message: impl Into<String>) {
        let line = JobLog::info(job.id, message, self.clock.now());
        if let Err(e) = self.logs.append(&line).await {
            warn!(job_id = %job.id, error = %e, "audit log append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{JobType, RetryBackoff};
    use crate::queue::MemoryQueue;
    use crate::repository::MemoryStore;
    use chrono::TimeZone;

    struct Fixture {
        planner: Planner,
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        clock: ManualClock,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(start());
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new(Arc::new(clock.clone())));
        let planner = Planner::new(
            store.clone(),
            store.clone(),
            store.clone(),
            queue.clone(),
            Arc::new(clock.clone()),
            JobSettings::default(),
        );
        Fixture {
            planner,
            store,
            queue,
            clock,
        }
    }

    fn http_request(schedule_type: ScheduleType) -> CreateJobRequest {
        CreateJobRequest::new(Uuid::new_v4(), "ping", JobType::Http, schedule_type)
            .with_payload(serde_json::json!({"url": "http://svc/ok", "method": "GET"}))
    }

    #[tokio::test]
    async fn test_create_immediate_enqueues() {
        let f = fixture();
        let job = f.planner.create(http_request(ScheduleType::Immediate)).await.unwrap();

        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.next_execution_at, Some(start()));
        assert_eq!(job.max_retries, 3);
        assert_eq!(job.retry_delay_ms, 5_000);

        let envelope = f.queue.pop().await.unwrap().unwrap();
        assert_eq!(envelope.job_id, job.id);
        assert_eq!(envelope.attempts_made, 0);
    }

    #[tokio::test]
    async fn test_create_scheduled_delays_visibility() {
        let f = fixture();
        let at = start() + chrono::Duration::minutes(10);
        let job = f
            .planner
            .create(http_request(ScheduleType::Scheduled).with_scheduled_at(at))
            .await
            .unwrap();
        assert_eq!(job.next_execution_at, Some(at));

        assert!(f.queue.pop().await.unwrap().is_none());
        f.clock.advance(chrono::Duration::minutes(10));
        assert_eq!(f.queue.pop().await.unwrap().unwrap().job_id, job.id);
    }

    #[tokio::test]
    async fn test_create_scheduled_in_past_rejected_without_row() {
        let f = fixture();
        let err = f
            .planner
            .create(
                http_request(ScheduleType::Scheduled)
                    .with_scheduled_at(start() - chrono::Duration::seconds(10)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchedule(_)));

        // No row persisted, no queue entry
        let jobs = f.store.list(&crate::models::JobFilter::new()).await.unwrap();
        assert!(jobs.is_empty());
        assert!(f.queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_recurring_registers_repeatable() {
        let f = fixture();
        let job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();

        assert_eq!(
            job.next_execution_at,
            Some(start() + chrono::Duration::minutes(5))
        );
        let registration = f.queue.repeatable_for(job.id).await.unwrap();
        assert_eq!(
            registration.next_fire_at,
            start() + chrono::Duration::minutes(5)
        );
    }

    #[tokio::test]
    async fn test_create_rejects_bad_cron() {
        let f = fixture();
        let err = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("99 * * * *", "UTC"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("minute"), "{}", err);
    }

    #[tokio::test]
    async fn test_trigger_enqueues_critical_without_advancing() {
        let f = fixture();
        let job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();
        let next_before = job.next_execution_at;

        f.planner.trigger(job.id).await.unwrap();
        let envelope = f.queue.pop().await.unwrap().unwrap();
        assert_eq!(envelope.job_id, job.id);

        let stored = JobStore::get(f.store.as_ref(), job.id).await.unwrap().unwrap();
        assert_eq!(stored.next_execution_at, next_before);
        assert!(f
            .store
            .log_messages(job.id)
            .iter()
            .any(|m| m == "manually triggered"));
    }

    #[tokio::test]
    async fn test_trigger_rejected_on_paused() {
        let f = fixture();
        let job = f.planner.create(http_request(ScheduleType::Immediate)).await.unwrap();
        f.planner.pause(job.id).await.unwrap();

        let err = f.planner.trigger(job.id).await.unwrap_err();
        assert!(matches!(err, Error::IllegalStateTransition(_)));
    }

    #[tokio::test]
    async fn test_pause_withdraws_queue_entries() {
        let f = fixture();
        let job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();

        let paused = f.planner.pause(job.id).await.unwrap();
        assert_eq!(paused.status, JobStatus::Paused);
        assert!(f.queue.repeatable_for(job.id).await.is_none());

        // Pausing twice is an illegal transition
        let err = f.planner.pause(job.id).await.unwrap_err();
        assert!(matches!(err, Error::IllegalStateTransition(_)));
    }

    #[tokio::test]
    async fn test_pause_resume_recomputes_from_now() {
        let f = fixture();
        let job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();

        f.planner.pause(job.id).await.unwrap();
        // Resume at 00:07 -> next fire 00:10
        f.clock.set(start() + chrono::Duration::minutes(7));
        let resumed = f.planner.resume(job.id).await.unwrap();

        assert_eq!(resumed.status, JobStatus::Active);
        assert_eq!(
            resumed.next_execution_at,
            Some(start() + chrono::Duration::minutes(10))
        );
        let registration = f.queue.repeatable_for(job.id).await.unwrap();
        assert_eq!(
            registration.next_fire_at,
            start() + chrono::Duration::minutes(10)
        );
    }

    #[tokio::test]
    async fn test_resume_rejected_on_active() {
        let f = fixture();
        let job = f.planner.create(http_request(ScheduleType::Immediate)).await.unwrap();
        let err = f.planner.resume(job.id).await.unwrap_err();
        assert!(matches!(err, Error::IllegalStateTransition(_)));
    }

    #[tokio::test]
    async fn test_reschedule_to_cron() {
        let f = fixture();
        let job = f
            .planner
            .create(
                http_request(ScheduleType::Scheduled)
                    .with_scheduled_at(start() + chrono::Duration::hours(1)),
            )
            .await
            .unwrap();

        let rescheduled = f
            .planner
            .reschedule(
                job.id,
                RescheduleRequest::Cron {
                    expression: "0 * * * *".into(),
                    timezone: "UTC".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(rescheduled.schedule_type, ScheduleType::Recurring);
        assert!(rescheduled.scheduled_at.is_none());
        assert_eq!(
            rescheduled.next_execution_at,
            Some(start() + chrono::Duration::hours(1))
        );
        // Old delayed envelope withdrawn
        f.clock.advance(chrono::Duration::hours(1));
        assert!(f.queue.pop().await.unwrap().is_none());
        assert!(f.queue.repeatable_for(job.id).await.is_some());
    }

    #[tokio::test]
    async fn test_reschedule_preserves_paused_state() {
        let f = fixture();
        let job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();
        f.planner.pause(job.id).await.unwrap();

        let rescheduled = f
            .planner
            .reschedule(
                job.id,
                RescheduleRequest::At(start() + chrono::Duration::minutes(30)),
            )
            .await
            .unwrap();
        assert_eq!(rescheduled.status, JobStatus::Paused);
        // Dormant until resume
        assert!(f.queue.repeatable_for(job.id).await.is_none());
        f.clock.advance(chrono::Duration::minutes(30));
        assert!(f.queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let f = fixture();
        let job = f.planner.create(http_request(ScheduleType::Immediate)).await.unwrap();

        let cancelled = f.planner.cancel(job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.next_execution_at.is_none());

        // Second cancel keeps the terminal state without error
        let again = f.planner.cancel(job.id).await.unwrap();
        assert_eq!(again.status, JobStatus::Cancelled);

        // But other actions reject
        assert!(f.planner.pause(job.id).await.is_err());
        assert!(f.planner.trigger(job.id).await.is_err());
        assert!(f
            .planner
            .reschedule(job.id, RescheduleRequest::At(start() + chrono::Duration::hours(1)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_state() {
        let f = fixture();
        let job = f.planner.create(http_request(ScheduleType::Immediate)).await.unwrap();
        f.planner.delete(job.id).await.unwrap();

        assert!(JobStore::get(f.store.as_ref(), job.id).await.unwrap().is_none());
        assert!(matches!(
            f.planner.trigger(job.id).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_due_repeatables_materialize_and_advance() {
        let f = fixture();
        let job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();

        // Nothing due yet
        assert_eq!(f.planner.run_due_repeatables().await.unwrap(), 0);

        f.clock.set(start() + chrono::Duration::minutes(5));
        assert_eq!(f.planner.run_due_repeatables().await.unwrap(), 1);
        let envelope = f.queue.pop().await.unwrap().unwrap();
        assert_eq!(envelope.job_id, job.id);

        let registration = f.queue.repeatable_for(job.id).await.unwrap();
        assert_eq!(
            registration.next_fire_at,
            start() + chrono::Duration::minutes(10)
        );
    }

    #[tokio::test]
    async fn test_overlapping_fire_is_skipped() {
        let f = fixture();
        let job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();

        // A still-running attempt from the previous fire
        let running = crate::models::Execution::start(
            job.id,
            Uuid::new_v4(),
            1,
            None,
            "worker-1",
            serde_json::json!({}),
            start(),
        );
        ExecutionStore::insert(f.store.as_ref(), &running).await.unwrap();

        f.clock.set(start() + chrono::Duration::minutes(5));
        assert_eq!(f.planner.run_due_repeatables().await.unwrap(), 0);
        assert!(f.queue.pop().await.unwrap().is_none());
        assert!(f
            .store
            .log_messages(job.id)
            .iter()
            .any(|m| m == "skipped_overlap"));

        // The registration still advanced past the skipped fire
        let registration = f.queue.repeatable_for(job.id).await.unwrap();
        assert_eq!(
            registration.next_fire_at,
            start() + chrono::Duration::minutes(10)
        );
    }

    #[tokio::test]
    async fn test_advance_recurring_end_condition() {
        let f = fixture();
        let mut job = f
            .planner
            .create(
                http_request(ScheduleType::Recurring)
                    .with_cron("*/5 * * * *", "UTC")
                    .with_max_executions(2),
            )
            .await
            .unwrap();

        job.total_executions = 2;
        f.planner.advance_recurring(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.next_execution_at.is_none());
        assert!(f.queue.repeatable_for(job.id).await.is_none());
    }

    #[tokio::test]
    async fn test_advance_recurring_computes_next() {
        let f = fixture();
        let mut job = f
            .planner
            .create(http_request(ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
            .await
            .unwrap();

        f.clock.set(start() + chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
        job.total_executions = 1;
        job.successful_executions = 1;
        f.planner.advance_recurring(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(
            job.next_execution_at,
            Some(start() + chrono::Duration::minutes(10))
        );
    }

    #[tokio::test]
    async fn test_defaults_applied_from_settings() {
        let f = fixture();
        let job = f
            .planner
            .create(
                http_request(ScheduleType::Immediate)
                    .with_max_retries(1)
                    .with_retry_delay_ms(1_000)
                    .with_retry_backoff(RetryBackoff::Fixed)
                    .with_timeout_ms(2_000),
            )
            .await
            .unwrap();
        assert_eq!(job.max_retries, 1);
        assert_eq!(job.retry_delay_ms, 1_000);
        assert_eq!(job.retry_backoff, RetryBackoff::Fixed);
        assert_eq!(job.timeout_ms, 2_000);
    }
}
