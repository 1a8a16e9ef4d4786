//! PostgreSQL repository implementations

pub mod execution_repository;
pub mod job_log_repository;
pub mod job_repository;
pub mod owner_repository;

pub use execution_repository::PostgresExecutionRepository;
pub use job_log_repository::PostgresJobLogRepository;
pub use job_repository::PostgresJobRepository;
pub use owner_repository::PostgresOwnerRepository;
