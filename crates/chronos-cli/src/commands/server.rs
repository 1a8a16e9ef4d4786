//! Scheduler server process: owns the planner's request surface and
//! materializes due repeatable fires into envelopes. One active
//! scheduler per queue suffices; workers scale independently.

use std::time::Duration;
use tracing::{error, info};

use chronos_core::config::Config;
use chronos_core::Result;

use super::{build_runtime, shutdown_signal};

pub async fn run(config: Config) -> Result<()> {
    let runtime = build_runtime(&config).await?;
    let poll_interval = Duration::from_secs(config.server.poll_interval_secs.max(1));

    info!(
        poll_interval_secs = poll_interval.as_secs(),
        "scheduler server started"
    );

    let planner = runtime.planner.clone();
    let scheduler = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            match planner.run_due_repeatables().await {
                Ok(fired) if fired > 0 => {
                    info!(fired, "materialized recurring fires");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "scheduler pass failed");
                }
            }
        }
    });

    // Retention pass once per day; log rows are kept at least 14 days
    let pruner = {
        let planner = runtime.planner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match planner.prune_logs(chrono::Duration::days(14)).await {
                    Ok(pruned) if pruned > 0 => info!(pruned, "pruned job logs"),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "log prune failed"),
                }
            }
        })
    };

    shutdown_signal().await;
    info!("shutdown signal received, stopping scheduler");
    scheduler.abort();
    pruner.abort();

    Ok(())
}
