//! Worker pool and per-attempt execution lifecycle
//!
//! Workers pop envelopes from the ready queue, open an execution row,
//! dispatch to the type-specific adapter under the job's hard deadline,
//! finalize the outcome atomically with the job's counters, and decide
//! retries. Infrastructure failures abandon the attempt so the envelope
//! redelivers after the stall interval.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::WorkerSettings;
use crate::executor::ExecutorRegistry;
use crate::models::{
    Execution, ExecutionError, ExecutionStatus, Job, JobLog, JobStatus, ScheduleType,
};
use crate::notifier::{NotificationEvent, Notifier};
use crate::planner::Planner;
use crate::queue::{Envelope, ReadyQueue};
use crate::repository::{ExecutionStore, JobLogStore, JobStore, OwnerStore};
use crate::{retry, Result};

/// Windowed dispatch rate cap shared by all of a worker's tasks
struct RateLimiter {
    max: u32,
    window: Duration,
    state: Mutex<(tokio::time::Instant, u32)>,
}

impl RateLimiter {
    fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            state: Mutex::new((tokio::time::Instant::now(), 0)),
        }
    }

    async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = tokio::time::Instant::now();
                if now.duration_since(state.0) >= self.window {
                    *state = (now, 0);
                }
                if state.1 < self.max {
                    state.1 += 1;
                    return;
                }
                self.window - now.duration_since(state.0)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

pub struct WorkerPool {
    id: String,
    jobs: Arc<dyn JobStore>,
    executions: Arc<dyn ExecutionStore>,
    logs: Arc<dyn JobLogStore>,
    owners: Arc<dyn OwnerStore>,
    queue: Arc<dyn ReadyQueue>,
    registry: Arc<ExecutorRegistry>,
    notifier: Arc<dyn Notifier>,
    planner: Arc<Planner>,
    clock: Arc<dyn Clock>,
    semaphore: Arc<Semaphore>,
    limiter: RateLimiter,
    grace: Duration,
    stopping: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        executions: Arc<dyn ExecutionStore>,
        logs: Arc<dyn JobLogStore>,
        owners: Arc<dyn OwnerStore>,
        queue: Arc<dyn ReadyQueue>,
        registry: Arc<ExecutorRegistry>,
        notifier: Arc<dyn Notifier>,
        planner: Arc<Planner>,
        clock: Arc<dyn Clock>,
        settings: &WorkerSettings,
    ) -> Self {
        let id = format!("worker-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        info!(worker_id = %id, concurrency = settings.concurrency, "creating worker");

        Self {
            id,
            jobs,
            executions,
            logs,
            owners,
            queue,
            registry,
            notifier,
            planner,
            clock,
            semaphore: Arc::new(Semaphore::new(settings.concurrency)),
            limiter: RateLimiter::new(
                settings.limiter.max,
                Duration::from_millis(settings.limiter.window_ms),
            ),
            grace: Duration::from_secs(30),
            stopping: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Grace window awaited for in-flight attempts on shutdown
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Request shutdown: refuse new pops, drain in-flight attempts
    pub fn stop(&self) {
        info!(worker_id = %self.id, "worker stopping");
        self.stopping.store(true, Ordering::SeqCst);
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Spawn the worker loop
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move {
            worker.run().await;
        })
    }

    /// Worker loop: pop, dispatch, repeat until stopped, then drain
    pub async fn run(self: Arc<Self>) {
        info!(worker_id = %self.id, "worker running");

        let heartbeat = {
            let worker = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(30));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    debug!(
                        worker_id = %worker.id,
                        in_flight = worker.in_flight(),
                        "worker heartbeat"
                    );
                }
            })
        };

        while !self.is_stopping() {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if self.is_stopping() {
                break;
            }
            self.limiter.acquire().await;

            match self.queue.pop().await {
                Ok(Some(envelope)) => {
                    let worker = self.clone();
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        let envelope_id = envelope.id;
                        if let Err(e) = worker.process_envelope(envelope).await {
                            // Abandoned; the envelope redelivers after
                            // the stall interval
                            warn!(
                                worker_id = %worker.id,
                                envelope_id = %envelope_id,
                                error = %e,
                                "attempt abandoned"
                            );
                        }
                        worker.in_flight.fetch_sub(1, Ordering::SeqCst);
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => {
                    drop(permit);
                    error!(worker_id = %self.id, error = %e, "queue pop failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        heartbeat.abort();
        self.drain().await;
        info!(worker_id = %self.id, "worker stopped");
    }

    /// Await in-flight attempts up to the grace window, then give up
    async fn drain(&self) {
        let deadline = tokio::time::Instant::now() + self.grace;
        while self.in_flight() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    worker_id = %self.id,
                    abandoned = self.in_flight(),
                    "grace window elapsed with attempts in flight"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Pop and fully process a single envelope. Returns false when the
    /// queue had nothing visible.
    pub async fn process_next(&self) -> Result<bool> {
        match self.queue.pop().await? {
            Some(envelope) => {
                self.process_envelope(envelope).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The deterministic per-attempt pipeline
    async fn process_envelope(&self, envelope: Envelope) -> Result<()> {
        let Some(job) = self.jobs.get(envelope.job_id).await? else {
            // Job deleted while the envelope was queued
            self.queue.ack(envelope.id).await?;
            return Ok(());
        };

        if job.status != JobStatus::Active {
            debug!(job_id = %job.id, status = %job.status, "dropping envelope for inactive job");
            self.queue.ack(envelope.id).await?;
            return Ok(());
        }

        // Redelivery of a stalled envelope: a terminal attempt means the
        // outcome is already recorded, a running one is adopted
        let execution = match self.executions.find_by_envelope(envelope.id).await? {
            Some(existing) if existing.status.is_terminal() => {
                self.queue.ack(envelope.id).await?;
                return Ok(());
            }
            Some(mut existing) => {
                existing.worker_id = Some(self.id.clone());
                existing.started_at = Some(self.clock.now());
                self.executions.update(&existing).await?;
                debug!(execution_id = %existing.id, "adopted redelivered attempt");
                existing
            }
            None => {
                let execution = Execution::start(
                    job.id,
                    envelope.id,
                    envelope.attempts_made as i32 + 1,
                    envelope.previous_execution_id,
                    self.id.clone(),
                    job.payload.clone(),
                    self.clock.now(),
                );
                self.executions.insert(&execution).await?;
                execution
            }
        };

        self.append_log(
            JobLog::info(job.id, "started", self.clock.now())
                .with_execution(execution.id)
                .with_data(serde_json::json!({"attempt": execution.attempt})),
        )
        .await;

        info!(
            worker_id = %self.id,
            job_id = %job.id,
            attempt = execution.attempt,
            "attempt started"
        );

        let outcome = tokio::time::timeout(
            Duration::from_millis(job.timeout_ms as u64),
            self.registry.execute(&job),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => self.finalize_success(&job, execution, result, &envelope).await,
            Ok(Err(adapter_error)) => {
                self.finalize_failure(
                    &job,
                    execution,
                    ExecutionStatus::Failed,
                    adapter_error.to_string(),
                    &envelope,
                )
                .await
            }
            Err(_) => {
                self.finalize_failure(
                    &job,
                    execution,
                    ExecutionStatus::Timeout,
                    format!("attempt timed out after {}ms", job.timeout_ms),
                    &envelope,
                )
                .await
            }
        }
    }

    async fn finalize_success(
        &self,
        job: &Job,
        mut execution: Execution,
        result: serde_json::Value,
        envelope: &Envelope,
    ) -> Result<()> {
        let now = self.clock.now();
        execution.mark_completed(result, now);
        let duration_ms = execution.duration_ms.unwrap_or(0);

        let mut updated = job.clone();
        updated.last_executed_at = Some(now);
        updated.total_executions += 1;
        updated.successful_executions += 1;

        if updated.schedule_type == ScheduleType::Recurring {
            self.planner.advance_recurring(&mut updated).await?;
        } else {
            updated.status = JobStatus::Completed;
            updated.next_execution_at = None;
        }

        let applied = self.jobs.finalize_attempt(&updated, &execution).await?;
        if applied {
            info!(
                worker_id = %self.id,
                job_id = %job.id,
                attempt = execution.attempt,
                duration_ms,
                "attempt completed"
            );
            self.append_log(
                JobLog::info(job.id, format!("completed in {}ms", duration_ms), now)
                    .with_execution(execution.id),
            )
            .await;
            self.emit(NotificationEvent::JobCompleted {
                job: updated,
                execution: execution.clone(),
                duration_ms,
            })
            .await;
        }

        self.queue.ack(envelope.id).await
    }

    async fn finalize_failure(
        &self,
        job: &Job,
        mut execution: Execution,
        status: ExecutionStatus,
        message: String,
        envelope: &Envelope,
    ) -> Result<()> {
        let now = self.clock.now();
        execution.mark_failed(status, ExecutionError::new(message.clone()), now);
        if status == ExecutionStatus::Timeout {
            // Elapsed wall-clock is pinned to the enforced deadline
            execution.duration_ms = Some(job.timeout_ms);
        }

        let attempt = execution.attempt as u32;
        let is_last = retry::is_last_attempt(attempt, job.max_retries as u32);

        let mut updated = job.clone();
        updated.last_executed_at = Some(now);
        updated.total_executions += 1;
        updated.failed_executions += 1;

        if is_last {
            if updated.schedule_type == ScheduleType::Recurring {
                // Recurring jobs stay active on their regular cadence
                self.planner.advance_recurring(&mut updated).await?;
            } else {
                updated.status = JobStatus::Failed;
                updated.next_execution_at = None;
            }
        } else if updated.schedule_type != ScheduleType::Recurring {
            updated.next_execution_at = Some(now + chrono::Duration::milliseconds(
                retry::retry_delay(job, attempt).as_millis() as i64,
            ));
        }

        let applied = self.jobs.finalize_attempt(&updated, &execution).await?;
        if applied {
            warn!(
                worker_id = %self.id,
                job_id = %job.id,
                attempt,
                is_last,
                error = %message,
                "attempt failed"
            );
            self.append_log(
                JobLog::error(
                    job.id,
                    format!("failed: {}, last_attempt={}", message, is_last),
                    now,
                )
                .with_execution(execution.id),
            )
            .await;

            if !is_last {
                let delay = retry::retry_delay(job, attempt);
                self.queue
                    .enqueue_delayed(
                        Envelope::retry_of(job.id, attempt, execution.id, now),
                        job.priority_band(),
                        now + chrono::Duration::milliseconds(delay.as_millis() as i64),
                    )
                    .await?;
                self.emit(NotificationEvent::JobRetry {
                    job: updated,
                    attempt,
                    max_retries: job.max_retries as u32,
                    error_message: message,
                })
                .await;
            } else {
                self.emit(NotificationEvent::MaxRetriesExceeded {
                    job: updated.clone(),
                    max_retries: job.max_retries as u32,
                    last_error: message.clone(),
                })
                .await;
                if updated.status == JobStatus::Failed {
                    self.emit(NotificationEvent::JobFailed {
                        job: updated,
                        execution: execution.clone(),
                        error: message,
                        attempts: attempt,
                    })
                    .await;
                }
            }
        }

        self.queue.ack(envelope.id).await
    }

    /// Best-effort notification fan-out
    async fn emit(&self, event: NotificationEvent) {
        let owner = match self.owners.get(event.job().owner_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "owner lookup failed, notification dropped");
                return;
            }
        };
        if let Err(e) = self.notifier.notify(&owner, &event).await {
            warn!(error = %e, "notification failed");
        }
    }

    async fn append_log(&self, line: JobLog) {
        if let Err(e) = self.logs.append(&line).await {
            warn!(error = %e, "audit log append failed");
        }
    }
}
