//! Store access: database-agnostic traits plus Postgres and in-memory
//! implementations

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryStore;
pub use postgres::{
    PostgresExecutionRepository, PostgresJobLogRepository, PostgresJobRepository,
    PostgresOwnerRepository,
};
pub use traits::{ExecutionStore, JobLogStore, JobStore, OwnerStore};
