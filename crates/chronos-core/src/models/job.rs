//! Job types and definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::queue::PriorityBand;

/// Kind of work a job performs; selects the executor adapter. Immutable
/// after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Http,
    Webhook,
    Script,
    Email,
    Custom,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Http => write!(f, "http"),
            JobType::Webhook => write!(f, "webhook"),
            JobType::Script => write!(f, "script"),
            JobType::Email => write!(f, "email"),
            JobType::Custom => write!(f, "custom"),
        }
    }
}

/// When the job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "schedule_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// Enqueue as soon as the job is created
    Immediate,

    /// One-shot at `scheduled_at`
    Scheduled,

    /// Repeat per `cron_expression` in `timezone`
    Recurring,
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleType::Immediate => write!(f, "immediate"),
            ScheduleType::Scheduled => write!(f, "scheduled"),
            ScheduleType::Recurring => write!(f, "recurring"),
        }
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Active => write!(f, "active"),
            JobStatus::Paused => write!(f, "paused"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl JobStatus {
    /// Check if state is terminal (won't change except via delete)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Delay strategy between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "retry_backoff", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
    Fixed,
    Exponential,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        RetryBackoff::Exponential
    }
}

impl fmt::Display for RetryBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryBackoff::Fixed => write!(f, "fixed"),
            RetryBackoff::Exponential => write!(f, "exponential"),
        }
    }
}

/// Persistent specification of work with a schedule
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    /// Unique job ID
    pub id: Uuid,

    /// Owning user; deleting the owner cascades jobs
    pub owner_id: Uuid,

    /// Short display name (<= 255 chars)
    pub name: String,

    pub description: Option<String>,

    pub tags: Vec<String>,

    /// Arbitrary key/value bag, opaque to the core
    pub metadata: Value,

    pub job_type: JobType,

    /// Opaque to the core; validated by the type-specific adapter
    pub payload: Value,

    pub schedule_type: ScheduleType,

    pub scheduled_at: Option<DateTime<Utc>>,

    pub cron_expression: Option<String>,

    /// IANA zone name the cron expression is evaluated in
    pub timezone: String,

    pub status: JobStatus,

    /// 0..=10, higher dispatches first
    pub priority: i32,

    /// 0..=10 retries after the initial attempt
    pub max_retries: i32,

    pub retry_delay_ms: i64,

    pub retry_backoff: RetryBackoff,

    /// Per-attempt deadline, bounded 1s..1h
    pub timeout_ms: i64,

    pub last_executed_at: Option<DateTime<Utc>>,

    pub next_execution_at: Option<DateTime<Utc>>,

    pub total_executions: i64,

    pub successful_executions: i64,

    pub failed_executions: i64,

    /// Recurring jobs stop firing once this instant passes
    pub end_at: Option<DateTime<Utc>>,

    /// Recurring jobs stop firing once total_executions reaches this
    pub max_executions: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Check counters invariant: successful + failed <= total
    pub fn counters_consistent(&self) -> bool {
        self.successful_executions + self.failed_executions <= self.total_executions
    }

    /// Priority band the job's envelopes are enqueued into
    pub fn priority_band(&self) -> PriorityBand {
        match self.priority {
            8..=10 => PriorityBand::High,
            4..=7 => PriorityBand::Normal,
            _ => PriorityBand::Low,
        }
    }

    /// Total tries a single firing may consume: the original attempt plus
    /// `max_retries` retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retries as u32 + 1
    }

    /// Check whether a recurring job has reached an end condition
    pub fn end_condition_reached(&self, now: DateTime<Utc>) -> bool {
        if let Some(end_at) = self.end_at {
            if end_at <= now {
                return true;
            }
        }
        if let Some(max) = self.max_executions {
            if self.total_executions >= max {
                return true;
            }
        }
        false
    }
}

/// Request to create a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub owner_id: Uuid,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_bag")]
    pub metadata: Value,

    pub job_type: JobType,

    #[serde(default = "default_bag")]
    pub payload: Value,

    pub schedule_type: ScheduleType,

    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cron_expression: Option<String>,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default)]
    pub max_retries: Option<i32>,

    #[serde(default)]
    pub retry_delay_ms: Option<i64>,

    #[serde(default)]
    pub retry_backoff: RetryBackoff,

    #[serde(default)]
    pub timeout_ms: Option<i64>,

    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub max_executions: Option<i64>,
}

fn default_bag() -> Value {
    serde_json::json!({})
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_priority() -> i32 {
    5
}

impl CreateJobRequest {
    /// Create a minimal request; optional fields via the `with_*` builders
    pub fn new(
        owner_id: Uuid,
        name: impl Into<String>,
        job_type: JobType,
        schedule_type: ScheduleType,
    ) -> Self {
        Self {
            owner_id,
            name: name.into(),
            description: None,
            tags: vec![],
            metadata: default_bag(),
            job_type,
            payload: default_bag(),
            schedule_type,
            scheduled_at: None,
            cron_expression: None,
            timezone: default_timezone(),
            priority: default_priority(),
            max_retries: None,
            retry_delay_ms: None,
            retry_backoff: RetryBackoff::default(),
            timeout_ms: None,
            end_at: None,
            max_executions: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn with_cron(mut self, expression: impl Into<String>, timezone: impl Into<String>) -> Self {
        self.cron_expression = Some(expression.into());
        self.timezone = timezone.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: i64) -> Self {
        self.retry_delay_ms = Some(delay_ms);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_end_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    pub fn with_max_executions(mut self, max_executions: i64) -> Self {
        self.max_executions = Some(max_executions);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Validate bounds and schedule-type field requirements. Cron syntax
    /// is checked separately by the calendar engine.
    pub fn validate(&self, now: DateTime<Utc>) -> crate::Result<()> {
        use crate::Error;

        if self.name.is_empty() || self.name.len() > 255 {
            return Err(Error::invalid_schedule(
                "name must be 1..=255 characters",
            ));
        }

        if !(0..=10).contains(&self.priority) {
            return Err(Error::invalid_schedule("priority must be in 0..=10"));
        }

        if let Some(max_retries) = self.max_retries {
            if !(0..=10).contains(&max_retries) {
                return Err(Error::invalid_schedule("max_retries must be in 0..=10"));
            }
        }

        if let Some(delay) = self.retry_delay_ms {
            if delay <= 0 {
                return Err(Error::invalid_schedule("retry_delay_ms must be positive"));
            }
        }

        if let Some(timeout) = self.timeout_ms {
            if !(1_000..=3_600_000).contains(&timeout) {
                return Err(Error::invalid_schedule(
                    "timeout_ms must be between 1s and 1h",
                ));
            }
        }

        if let Some(max) = self.max_executions {
            if max <= 0 {
                return Err(Error::invalid_schedule("max_executions must be positive"));
            }
        }

        match self.schedule_type {
            ScheduleType::Immediate => {}
            ScheduleType::Scheduled => match self.scheduled_at {
                None => {
                    return Err(Error::invalid_schedule(
                        "scheduled jobs require scheduled_at",
                    ))
                }
                Some(at) if at <= now => {
                    return Err(Error::invalid_schedule(
                        "scheduled_at must be in the future",
                    ))
                }
                Some(_) => {}
            },
            ScheduleType::Recurring => {
                if self.cron_expression.is_none() {
                    return Err(Error::invalid_schedule(
                        "recurring jobs require cron_expression",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Request to move an existing job onto a new schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RescheduleRequest {
    /// Switch to a one-shot schedule at the given instant
    At(DateTime<Utc>),

    /// Switch to a recurring schedule
    Cron { expression: String, timezone: String },
}

/// Filter for job queries
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<JobStatus>,
    pub schedule_type: Option<ScheduleType>,
    pub job_type: Option<JobType>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Baseline active job used across the crate's tests
#[cfg(test)]
pub(crate) fn test_job() -> Job {
    use chrono::TimeZone;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Job {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        name: "test".into(),
        description: None,
        tags: vec![],
        metadata: serde_json::json!({}),
        job_type: JobType::Http,
        payload: serde_json::json!({}),
        schedule_type: ScheduleType::Immediate,
        scheduled_at: None,
        cron_expression: None,
        timezone: "UTC".into(),
        status: JobStatus::Active,
        priority: 5,
        max_retries: 3,
        retry_delay_ms: 5_000,
        retry_backoff: RetryBackoff::Exponential,
        timeout_ms: 30_000,
        last_executed_at: None,
        next_execution_at: None,
        total_executions: 0,
        successful_executions: 0,
        failed_executions: 0,
        end_at: None,
        max_executions: None,
        created_at: now,
        updated_at: now,
    }
}
