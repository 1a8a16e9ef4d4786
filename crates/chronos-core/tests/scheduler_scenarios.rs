//! End-to-end scenarios over the planner, queue and worker pipeline,
//! running against the in-memory queue and store with a manual clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use chronos_core::config::{JobSettings, WorkerSettings};
use chronos_core::executor::{AdapterError, ExecutorRegistry, JobExecutor, Payload};
use chronos_core::queue::{MemoryQueue, ReadyQueue};
use chronos_core::repository::{ExecutionStore, JobStore, MemoryStore, OwnerStore};
use chronos_core::{
    Clock, CreateJobRequest, ExecutionStatus, JobStatus, JobType, ManualClock, NotificationEvent,
    Notifier, Owner, Planner, ScheduleType, WorkerPool,
};

/// Scripted adapter: one outcome per attempt, optionally slow
struct ScriptedExecutor {
    outcomes: Mutex<Vec<Result<serde_json::Value, AdapterError>>>,
    delay_ms: u64,
}

impl ScriptedExecutor {
    fn new(outcomes: Vec<Result<serde_json::Value, AdapterError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            delay_ms: 0,
        }
    }

    fn slow(delay_ms: u64) -> Self {
        Self {
            outcomes: Mutex::new(vec![]),
            delay_ms,
        }
    }
}

#[async_trait]
impl JobExecutor for ScriptedExecutor {
    async fn execute(&self, _payload: &Payload) -> Result<serde_json::Value, AdapterError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            Ok(serde_json::json!({"statusCode": 200, "body": {"ok": true}}))
        } else {
            outcomes.remove(0)
        }
    }
}

/// Captures every emitted event for assertions
#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        _owner: &Owner,
        event: &NotificationEvent,
    ) -> chronos_core::Result<()> {
        let label = match event {
            NotificationEvent::JobCompleted { .. } => "job_completed",
            NotificationEvent::JobRetry { .. } => "job_retry",
            NotificationEvent::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            NotificationEvent::JobFailed { .. } => "job_failed",
        };
        self.events.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

struct Harness {
    planner: Arc<Planner>,
    worker: Arc<WorkerPool>,
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    clock: ManualClock,
    notifier: Arc<RecordingNotifier>,
    owner_id: Uuid,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

async fn harness(executor: ScriptedExecutor) -> Harness {
    let clock = ManualClock::new(start());
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new(Arc::new(clock.clone())));
    let notifier = Arc::new(RecordingNotifier::default());

    let owner = Owner {
        id: Uuid::new_v4(),
        email: "ops@example.com".into(),
        notify_on_completion: true,
        notify_on_failure: true,
        created_at: start(),
    };
    OwnerStore::insert(store.as_ref(), &owner).await.unwrap();

    let planner = Arc::new(Planner::new(
        store.clone(),
        store.clone(),
        store.clone(),
        queue.clone(),
        Arc::new(clock.clone()),
        JobSettings::default(),
    ));

    let mut registry = ExecutorRegistry::new();
    registry.register(JobType::Http, Arc::new(executor));

    let worker = Arc::new(WorkerPool::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        queue.clone(),
        Arc::new(registry),
        notifier.clone(),
        planner.clone(),
        Arc::new(clock.clone()),
        &WorkerSettings::default(),
    ));

    Harness {
        planner,
        worker,
        store,
        queue,
        clock,
        notifier,
        owner_id: owner.id,
    }
}

fn http_request(h: &Harness, schedule_type: ScheduleType) -> CreateJobRequest {
    CreateJobRequest::new(h.owner_id, "svc-call", JobType::Http, schedule_type)
        .with_payload(serde_json::json!({"url": "http://svc/ok", "method": "GET"}))
}

#[tokio::test]
async fn immediate_http_job_success() {
    let h = harness(ScriptedExecutor::new(vec![Ok(
        serde_json::json!({"statusCode": 200, "body": {"ok": true}}),
    )]))
    .await;

    let job = h
        .planner
        .create(
            http_request(&h, ScheduleType::Immediate)
                .with_max_retries(3)
                .with_timeout_ms(30_000),
        )
        .await
        .unwrap();

    assert!(h.worker.process_next().await.unwrap());

    let stored = JobStore::get(h.store.as_ref(), job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.total_executions, 1);
    assert_eq!(stored.successful_executions, 1);

    let executions = ExecutionStore::list_for_job(h.store.as_ref(), job.id, 10)
        .await
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Completed);
    assert_eq!(executions[0].attempt, 1);
    assert_eq!(executions[0].result.as_ref().unwrap()["statusCode"], 200);

    assert_eq!(h.notifier.labels(), vec!["job_completed"]);
}

#[tokio::test]
async fn http_job_500_then_success_on_retry() {
    let h = harness(ScriptedExecutor::new(vec![
        Err(AdapterError::Failed("request failed with status 500".into())),
        Ok(serde_json::json!({"statusCode": 200, "body": {"ok": true}})),
    ]))
    .await;

    let job = h
        .planner
        .create(http_request(&h, ScheduleType::Immediate))
        .await
        .unwrap();

    assert!(h.worker.process_next().await.unwrap());

    // Retry parked with delay = retry_delay_ms * 2^0 = 5000 ms
    let delayed = h.queue.delayed_entries().await;
    assert_eq!(delayed.len(), 1);
    assert_eq!(delayed[0].0 - start(), Duration::milliseconds(5_000));

    h.clock.advance(Duration::milliseconds(5_000));
    assert!(h.worker.process_next().await.unwrap());

    let stored = JobStore::get(h.store.as_ref(), job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.successful_executions, 1);
    assert_eq!(stored.failed_executions, 1);

    let mut executions = ExecutionStore::list_for_job(h.store.as_ref(), job.id, 10)
        .await
        .unwrap();
    executions.sort_by_key(|e| e.attempt);
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0].status, ExecutionStatus::Failed);
    assert_eq!(executions[1].status, ExecutionStatus::Completed);
    assert!(executions[1].is_retry);
    assert_eq!(executions[1].previous_execution_id, Some(executions[0].id));

    assert_eq!(h.notifier.labels(), vec!["job_retry", "job_completed"]);
}

#[tokio::test]
async fn http_job_always_fails_with_two_retries() {
    let h = harness(ScriptedExecutor::new(vec![
        Err(AdapterError::Failed("request failed with status 500".into())),
        Err(AdapterError::Failed("request failed with status 500".into())),
        Err(AdapterError::Failed("request failed with status 500".into())),
    ]))
    .await;

    let job = h
        .planner
        .create(http_request(&h, ScheduleType::Immediate).with_max_retries(2))
        .await
        .unwrap();

    // Attempt 1, retry delayed 5000ms
    assert!(h.worker.process_next().await.unwrap());
    let delayed = h.queue.delayed_entries().await;
    assert_eq!(delayed[0].0 - start(), Duration::milliseconds(5_000));

    // Attempt 2, exponential backoff 10000ms
    h.clock.set(start() + Duration::milliseconds(5_000));
    assert!(h.worker.process_next().await.unwrap());
    let delayed = h.queue.delayed_entries().await;
    assert_eq!(
        delayed[0].0 - h.clock.now(),
        Duration::milliseconds(10_000)
    );

    // Attempt 3 exhausts the budget
    h.clock.set(start() + Duration::milliseconds(15_000));
    assert!(h.worker.process_next().await.unwrap());

    let stored = JobStore::get(h.store.as_ref(), job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.total_executions, 3);
    assert_eq!(stored.failed_executions, 3);

    let executions = ExecutionStore::list_for_job(h.store.as_ref(), job.id, 10)
        .await
        .unwrap();
    assert_eq!(executions.len(), 3);
    assert!(executions.iter().all(|e| e.status == ExecutionStatus::Failed));

    // max_retries_exceeded fires exactly once, and the terminal job
    // failure emits job_failed alongside it
    let labels = h.notifier.labels();
    assert_eq!(
        labels.iter().filter(|l| *l == "max_retries_exceeded").count(),
        1
    );
    assert_eq!(labels.iter().filter(|l| *l == "job_failed").count(), 1);
    assert_eq!(labels.iter().filter(|l| *l == "job_retry").count(), 2);
}

#[tokio::test]
async fn recurring_job_advances_and_survives_pause_resume() {
    let h = harness(ScriptedExecutor::new(vec![Ok(serde_json::json!({"ok": true}))])).await;

    let job = h
        .planner
        .create(http_request(&h, ScheduleType::Recurring).with_cron("*/5 * * * *", "UTC"))
        .await
        .unwrap();
    assert_eq!(
        job.next_execution_at,
        Some(start() + Duration::minutes(5))
    );

    // First fire at 00:05
    h.clock.set(start() + Duration::minutes(5));
    assert_eq!(h.planner.run_due_repeatables().await.unwrap(), 1);
    assert!(h.worker.process_next().await.unwrap());

    let stored = JobStore::get(h.store.as_ref(), job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Active);
    assert_eq!(
        stored.next_execution_at,
        Some(start() + Duration::minutes(10))
    );

    // Pause, then resume at 00:07: next fire is still 00:10
    h.clock.set(start() + Duration::minutes(6));
    h.planner.pause(job.id).await.unwrap();
    h.clock.set(start() + Duration::minutes(7));
    let resumed = h.planner.resume(job.id).await.unwrap();
    assert_eq!(
        resumed.next_execution_at,
        Some(start() + Duration::minutes(10))
    );
}

#[tokio::test]
async fn scheduled_job_in_the_past_is_rejected() {
    let h = harness(ScriptedExecutor::new(vec![])).await;

    let err = h
        .planner
        .create(
            http_request(&h, ScheduleType::Scheduled)
                .with_scheduled_at(start() - Duration::seconds(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, chronos_core::Error::InvalidSchedule(_)));

    // No row persisted, no queue entry
    let jobs = h
        .store
        .list(&chronos_core::JobFilter::new())
        .await
        .unwrap();
    assert!(jobs.is_empty());
    assert!(h.queue.pop().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn timeout_is_recorded_and_feeds_retry() {
    let h = harness(ScriptedExecutor::slow(5_000)).await;

    let job = h
        .planner
        .create(http_request(&h, ScheduleType::Immediate).with_timeout_ms(1_000))
        .await
        .unwrap();

    assert!(h.worker.process_next().await.unwrap());

    let executions = ExecutionStore::list_for_job(h.store.as_ref(), job.id, 10)
        .await
        .unwrap();
    assert_eq!(executions[0].status, ExecutionStatus::Timeout);
    assert_eq!(executions[0].duration_ms, Some(1_000));

    // Retry decision as if it were a failure
    let stored = JobStore::get(h.store.as_ref(), job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Active);
    assert_eq!(stored.failed_executions, 1);
    assert_eq!(h.queue.delayed_entries().await.len(), 1);
    assert_eq!(h.notifier.labels(), vec!["job_retry"]);
}

#[tokio::test]
async fn manual_trigger_runs_at_critical_priority() {
    let h = harness(ScriptedExecutor::new(vec![Ok(serde_json::json!({"ok": true}))])).await;

    let job = h
        .planner
        .create(http_request(&h, ScheduleType::Recurring).with_cron("0 0 * * *", "UTC"))
        .await
        .unwrap();

    h.planner.trigger(job.id).await.unwrap();
    assert!(h.worker.process_next().await.unwrap());

    // Manual triggers count toward the execution counters
    let stored = JobStore::get(h.store.as_ref(), job.id).await.unwrap().unwrap();
    assert_eq!(stored.total_executions, 1);
    assert_eq!(stored.status, JobStatus::Active);
    assert!(h
        .store
        .log_messages(job.id)
        .iter()
        .any(|m| m == "manually triggered"));
}

#[tokio::test]
async fn counters_invariant_holds_across_outcomes() {
    let h = harness(ScriptedExecutor::new(vec![
        Err(AdapterError::Failed("boom".into())),
        Ok(serde_json::json!({"ok": true})),
    ]))
    .await;

    let job = h
        .planner
        .create(http_request(&h, ScheduleType::Immediate).with_max_retries(1))
        .await
        .unwrap();

    assert!(h.worker.process_next().await.unwrap());
    h.clock.advance(Duration::milliseconds(5_000));
    assert!(h.worker.process_next().await.unwrap());

    let stored = JobStore::get(h.store.as_ref(), job.id).await.unwrap().unwrap();
    assert!(stored.counters_consistent());
    assert_eq!(
        stored.successful_executions + stored.failed_executions,
        stored.total_executions
    );
}
