//! Job management from the command line: the planner's request surface
//! for operators.

use clap::Subcommand;
use std::path::PathBuf;
use uuid::Uuid;

use chronos_core::config::Config;
use chronos_core::{
    CreateJobRequest, Error, Job, JobFilter, JobStatus, RescheduleRequest, Result,
};

use super::build_runtime;

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Create a job from a JSON definition file
    Create {
        #[arg(short, long, help = "Path to a JSON job definition")]
        file: PathBuf,
    },

    /// List jobs
    List {
        #[arg(long, help = "Filter by owner id")]
        owner: Option<Uuid>,

        #[arg(long, help = "Filter by status (active|paused|completed|failed|cancelled)")]
        status: Option<String>,

        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show a job with its recent executions and logs
    Show { id: Uuid },

    /// Enqueue a one-shot attempt at the highest priority
    Trigger { id: Uuid },

    /// Pause scheduling for a job
    Pause { id: Uuid },

    /// Resume a paused job
    Resume { id: Uuid },

    /// Move a job to a new one-shot instant
    RescheduleAt {
        id: Uuid,

        #[arg(help = "RFC 3339 instant, e.g. 2024-06-01T12:00:00Z")]
        at: chrono::DateTime<chrono::Utc>,
    },

    /// Move a job to a new recurring schedule
    RescheduleCron {
        id: Uuid,

        #[arg(help = "Five-field calendar expression")]
        expression: String,

        #[arg(long, default_value = "UTC")]
        timezone: String,
    },

    /// Cancel a job
    Cancel { id: Uuid },

    /// Cancel a job and remove its history
    Delete { id: Uuid },

    /// Show queue depth
    Stats,
}

pub async fn run(config: Config, command: JobCommands) -> Result<()> {
    let runtime = build_runtime(&config).await?;

    match command {
        JobCommands::Create { file } => {
            let contents = std::fs::read_to_string(&file)?;
            let request: CreateJobRequest = serde_json::from_str(&contents)?;
            let job = runtime.planner.create(request).await?;
            print_job(&job);
        }
        JobCommands::List {
            owner,
            status,
            limit,
        } => {
            let mut filter = JobFilter::new().with_limit(limit);
            filter.owner_id = owner;
            filter.status = status.as_deref().map(parse_status).transpose()?;

            let jobs = runtime.jobs.list(&filter).await?;
            for job in jobs {
                println!(
                    "{}  {:<10} {:<10} {:<24} next={}",
                    job.id,
                    job.status,
                    job.schedule_type,
                    job.name,
                    job.next_execution_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".into())
                );
            }
        }
        JobCommands::Show { id } => {
            let job = runtime
                .jobs
                .get(id)
                .await?
                .ok_or_else(|| Error::not_found(format!("job {}", id)))?;
            print_job(&job);

            let executions = runtime.executions.list_for_job(id, 10).await?;
            if !executions.is_empty() {
                println!("\nrecent executions:");
                for execution in executions {
                    println!(
                        "  {}  attempt={} {} duration={}ms",
                        execution.id,
                        execution.attempt,
                        execution.status,
                        execution.duration_ms.unwrap_or(0)
                    );
                }
            }

            let logs = runtime.logs.list_for_job(id, 10).await?;
            if !logs.is_empty() {
                println!("\nrecent logs:");
                for log in logs {
                    println!("  {}  [{}] {}", log.timestamp.to_rfc3339(), log.level, log.message);
                }
            }
        }
        JobCommands::Trigger { id } => {
            runtime.planner.trigger(id).await?;
            println!("triggered {}", id);
        }
        JobCommands::Pause { id } => {
            runtime.planner.pause(id).await?;
            println!("paused {}", id);
        }
        JobCommands::Resume { id } => {
            let job = runtime.planner.resume(id).await?;
            println!(
                "resumed {}, next execution {}",
                id,
                job.next_execution_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".into())
            );
        }
        JobCommands::RescheduleAt { id, at } => {
            runtime
                .planner
                .reschedule(id, RescheduleRequest::At(at))
                .await?;
            println!("rescheduled {} to {}", id, at.to_rfc3339());
        }
        JobCommands::RescheduleCron {
            id,
            expression,
            timezone,
        } => {
            let job = runtime
                .planner
                .reschedule(
                    id,
                    RescheduleRequest::Cron {
                        expression,
                        timezone,
                    },
                )
                .await?;
            println!(
                "rescheduled {}, next execution {}",
                id,
                job.next_execution_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".into())
            );
        }
        JobCommands::Cancel { id } => {
            runtime.planner.cancel(id).await?;
            println!("cancelled {}", id);
        }
        JobCommands::Delete { id } => {
            runtime.planner.delete(id).await?;
            println!("deleted {}", id);
        }
        JobCommands::Stats => {
            let stats = runtime.queue.stats().await?;
            println!("ready:       {}", stats.total_ready());
            println!("  critical:  {}", stats.ready_critical);
            println!("  high:      {}", stats.ready_high);
            println!("  normal:    {}", stats.ready_normal);
            println!("  low:       {}", stats.ready_low);
            println!("delayed:     {}", stats.delayed);
            println!("processing:  {}", stats.processing);
            println!("repeatables: {}", stats.repeatables);
        }
    }

    Ok(())
}

fn parse_status(value: &str) -> Result<JobStatus> {
    match value {
        "active" => Ok(JobStatus::Active),
        "paused" => Ok(JobStatus::Paused),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        "cancelled" => Ok(JobStatus::Cancelled),
        other => Err(Error::config(format!("unknown status: {}", other))),
    }
}

fn print_job(job: &Job) {
    println!("id:          {}", job.id);
    println!("name:        {}", job.name);
    println!("type:        {}", job.job_type);
    println!("schedule:    {}", job.schedule_type);
    if let Some(expression) = &job.cron_expression {
        println!("cron:        {} ({})", expression, job.timezone);
    }
    if let Some(at) = job.scheduled_at {
        println!("scheduled:   {}", at.to_rfc3339());
    }
    println!("status:      {}", job.status);
    println!("priority:    {}", job.priority);
    println!(
        "retries:     max={} delay={}ms backoff={}",
        job.max_retries, job.retry_delay_ms, job.retry_backoff
    );
    println!("timeout:     {}ms", job.timeout_ms);
    println!(
        "executions:  total={} ok={} failed={}",
        job.total_executions, job.successful_executions, job.failed_executions
    );
    println!(
        "next run:    {}",
        job.next_execution_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into())
    );
}
