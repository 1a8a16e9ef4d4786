//! Append-only audit log lines for jobs and executions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "log_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

// Log rows are written once and never mutated; retention is enforced by a
// periodic prune (>= 14 days).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobLog {
    pub id: Uuid,

    pub job_id: Uuid,

    /// Weak back-reference; may outlive execution nullification
    pub execution_id: Option<Uuid>,

    pub level: LogLevel,

    pub message: String,

    pub data: Value,

    pub timestamp: DateTime<Utc>,
}

impl JobLog {
    pub fn new(job_id: Uuid, level: LogLevel, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            execution_id: None,
            level,
            message: message.into(),
            data: serde_json::json!({}),
            timestamp: now,
        }
    }

    pub fn info(job_id: Uuid, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(job_id, LogLevel::Info, message, now)
    }

    pub fn warn(job_id: Uuid, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(job_id, LogLevel::Warn, message, now)
    }

    pub fn error(job_id: Uuid, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(job_id, LogLevel::Error, message, now)
    }

    pub fn with_execution(mut self, execution_id: Uuid) -> Self {
        self.execution_id = Some(execution_id);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}
