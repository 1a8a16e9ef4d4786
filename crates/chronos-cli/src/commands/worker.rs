//! Worker process: pops envelopes and runs attempts until signalled,
//! then drains in-flight work within the grace window.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use chronos_core::config::Config;
use chronos_core::executor::{CustomExecutor, EmailExecutor, ExecutorRegistry};
use chronos_core::notifier::{EmailNotifier, NoopNotifier, Notifier};
use chronos_core::{Result, WorkerPool};

use super::{build_runtime, shutdown_signal};

pub async fn run(config: Config) -> Result<()> {
    let runtime = build_runtime(&config).await?;

    let email = EmailExecutor::from_config(&config.notifications.email)?;
    let registry = Arc::new(ExecutorRegistry::with_defaults(email, CustomExecutor::new()));

    let notifier: Arc<dyn Notifier> = if config.notifications.enabled
        && config.notifications.email.smtp_host.is_some()
    {
        Arc::new(EmailNotifier::from_config(&config.notifications.email)?)
    } else {
        Arc::new(NoopNotifier)
    };

    let pool = Arc::new(
        WorkerPool::new(
            runtime.jobs.clone(),
            runtime.executions.clone(),
            runtime.logs.clone(),
            runtime.owners.clone(),
            runtime.queue.clone(),
            registry,
            notifier,
            runtime.planner.clone(),
            runtime.clock.clone(),
            &config.worker,
        )
        .with_grace(Duration::from_secs(
            config.server.graceful_shutdown_timeout_secs,
        )),
    );

    info!(
        worker_id = pool.id(),
        concurrency = config.worker.concurrency,
        "worker process started"
    );

    let handle = pool.clone().start();

    shutdown_signal().await;
    info!("shutdown signal received, draining worker");
    pool.stop();
    handle.await.ok();

    Ok(())
}
