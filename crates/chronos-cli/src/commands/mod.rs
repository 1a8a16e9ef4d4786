pub mod db;
pub mod job;
pub mod server;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use chronos_core::config::Config;
use chronos_core::db::create_pool;
use chronos_core::queue::{QueuePool, RedisQueue};
use chronos_core::repository::{
    PostgresExecutionRepository, PostgresJobLogRepository, PostgresJobRepository,
    PostgresOwnerRepository,
};
use chronos_core::{
    Clock, ExecutionStore, JobLogStore, JobStore, OwnerStore, Planner, ReadyQueue, Result,
    SystemClock,
};

/// Shared handles every long-lived process builds at startup
pub struct Runtime {
    pub jobs: Arc<dyn JobStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub logs: Arc<dyn JobLogStore>,
    pub owners: Arc<dyn OwnerStore>,
    pub queue: Arc<dyn ReadyQueue>,
    pub planner: Arc<Planner>,
    pub clock: Arc<dyn Clock>,
}

/// Connect the store and queue backends and wire the planner
pub async fn build_runtime(config: &Config) -> Result<Runtime> {
    let pool = create_pool(&config.store).await?;
    chronos_core::db::migrate::Migrator::new(pool.clone()).run().await?;

    let queue_pool = QueuePool::connect(&config.queue).await?;
    let queue: Arc<dyn ReadyQueue> = Arc::new(RedisQueue::new(
        queue_pool,
        Duration::from_secs(config.queue.stall_timeout_secs),
    ));

    let jobs: Arc<dyn JobStore> = Arc::new(PostgresJobRepository::new(pool.clone()));
    let executions: Arc<dyn ExecutionStore> =
        Arc::new(PostgresExecutionRepository::new(pool.clone()));
    let logs: Arc<dyn JobLogStore> = Arc::new(PostgresJobLogRepository::new(pool.clone()));
    let owners: Arc<dyn OwnerStore> = Arc::new(PostgresOwnerRepository::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let planner = Arc::new(Planner::new(
        jobs.clone(),
        executions.clone(),
        logs.clone(),
        queue.clone(),
        clock.clone(),
        config.job.clone(),
    ));

    Ok(Runtime {
        jobs,
        executions,
        logs,
        owners,
        queue,
        planner,
        clock,
    })
}

/// Resolve on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
