//! Execution records: one row per attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Attempt lifecycle state. Transitions are monotonic:
/// pending -> running -> (completed | failed | cancelled | timeout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "execution_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
            ExecutionStatus::Timeout => write!(f, "timeout"),
        }
    }
}

impl ExecutionStatus {
    /// Check if the attempt reached a final state; terminal records are
    /// immutable except for log append
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Timeout
        )
    }

    /// Failed and timed-out attempts feed the retry decision
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::Timeout)
    }
}

/// Error recorded on a failed attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub message: String,

    #[serde(default)]
    pub stack: Option<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// A single attempt record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Execution {
    pub id: Uuid,

    pub job_id: Uuid,

    pub status: ExecutionStatus,

    /// 1-based; attempt 1 is the original, 2..=(max_retries + 1) are
    /// retries
    pub attempt: i32,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    pub duration_ms: Option<i64>,

    /// Adapter result bag, set on success
    pub result: Option<Value>,

    /// `{message, stack}` bag, set on failure
    pub error: Option<Value>,

    pub is_retry: bool,

    /// Links the retry chain; the chain head has None
    pub previous_execution_id: Option<Uuid>,

    pub worker_id: Option<String>,

    /// Envelope that produced this attempt, used to make redeliveries
    /// idempotent
    pub envelope_id: Uuid,

    pub input: Value,

    pub output: Option<Value>,

    pub created_at: DateTime<Utc>,
}

impl Execution {
    /// Open a running attempt record
    pub fn start(
        job_id: Uuid,
        envelope_id: Uuid,
        attempt: i32,
        previous_execution_id: Option<Uuid>,
        worker_id: impl Into<String>,
        input: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            status: ExecutionStatus::Running,
            attempt,
            started_at: Some(now),
            completed_at: None,
            duration_ms: None,
            result: None,
            error: None,
            is_retry: attempt > 1,
            previous_execution_id,
            worker_id: Some(worker_id.into()),
            envelope_id,
            input,
            output: None,
            created_at: now,
        }
    }

    /// Mark as completed with the adapter's result
    pub fn mark_completed(&mut self, result: Value, now: DateTime<Utc>) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(now);
        self.duration_ms = self.elapsed_ms(now);
        self.output = Some(result.clone());
        self.result = Some(result);
    }

    /// Mark as failed (or timed out) with the recorded error
    pub fn mark_failed(&mut self, status: ExecutionStatus, error: ExecutionError, now: DateTime<Utc>) {
        debug_assert!(status.counts_as_failure());
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = self.elapsed_ms(now);
        self.error = serde_json::to_value(&error).ok();
    }

    fn elapsed_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at
            .map(|started| (now - started).num_milliseconds().max(0))
    }

    /// Parse the stored error bag back into a structured error
    pub fn error_detail(&self) -> Option<ExecutionError> {
        self.error
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
