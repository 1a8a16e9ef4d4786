//! Core entities: jobs, executions, audit logs, owners

pub mod execution;
pub mod job;
pub mod job_log;
pub mod owner;

pub use execution::{Execution, ExecutionError, ExecutionStatus};
pub use job::{
    CreateJobRequest, Job, JobFilter, JobStatus, JobType, RescheduleRequest, RetryBackoff,
    ScheduleType,
};
pub use job_log::{JobLog, LogLevel};
pub use owner::Owner;
