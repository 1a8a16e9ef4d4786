pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod models;
pub mod notifier;
pub mod planner;
pub mod queue;
pub mod repository;
pub mod retry;
pub mod schedule;
pub mod worker;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{AdapterError, ExecutorRegistry, JobExecutor, Payload};
pub use models::{
    CreateJobRequest, Execution, ExecutionStatus, Job, JobFilter, JobLog, JobStatus, JobType,
    LogLevel, Owner, RescheduleRequest, RetryBackoff, ScheduleType,
};
pub use notifier::{NotificationEvent, Notifier};
pub use planner::Planner;
pub use queue::{Envelope, PriorityBand, QueueStats, ReadyQueue};
pub use repository::{ExecutionStore, JobLogStore, JobStore, OwnerStore};
pub use schedule::CalendarEngine;
pub use worker::WorkerPool;

/// Current version of chronos
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
    }
}
