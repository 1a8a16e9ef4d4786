use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chronos_core::{Config, Result};

mod commands;

#[derive(Parser)]
#[command(name = "chronos")]
#[command(about = "Chronos distributed job scheduler")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Set log level")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduler server (owns the planner and repeatable
    /// materialization)
    Server {
        #[arg(long, help = "Seconds between scheduler polls")]
        poll_interval: Option<u64>,
    },

    /// Start a worker process
    Worker {
        #[arg(short = 'C', long, help = "Concurrent attempts per worker")]
        concurrency: Option<usize>,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        command: commands::db::DbCommands,
    },

    /// Job management
    Job {
        #[command(subcommand)]
        command: commands::job::JobCommands,
    },

    /// Show effective configuration
    Config,
}

fn init_logging(config: &Config, override_level: Option<&str>) {
    let level = override_level.unwrap_or(&config.log.level).to_string();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    match &config.log.file_path {
        Some(path) => {
            let path = std::path::Path::new(path);
            let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "chronos.log".to_string());
            let appender = tracing_appender::rolling::daily(directory, file_name);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(appender)
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path.to_string_lossy()),
        None => Config::from_env(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    init_logging(&config, cli.log_level.as_deref());

    match cli.command {
        Commands::Server { poll_interval } => {
            let mut config = config;
            if let Some(interval) = poll_interval {
                config.server.poll_interval_secs = interval;
            }
            commands::server::run(config).await
        }
        Commands::Worker { concurrency } => {
            let mut config = config;
            if let Some(concurrency) = concurrency {
                config.worker.concurrency = concurrency;
            }
            commands::worker::run(config).await
        }
        Commands::Db { command } => commands::db::run(config, command).await,
        Commands::Job { command } => commands::job::run(config, command).await,
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| chronos_core::Error::config(e.to_string()))?;
            println!("{}", rendered);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
