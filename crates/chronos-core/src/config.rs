use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for chronos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub job: JobSettings,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            queue: QueueConfig::default(),
            job: JobSettings::default(),
            worker: WorkerSettings::default(),
            log: LogConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, crate::Error> {
        use crate::Error;

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, crate::Error> {
        // Try CHRONOS_CONFIG env var first
        if let Ok(config_path) = std::env::var("CHRONOS_CONFIG") {
            return Self::load(&config_path);
        }

        // Try default locations
        let default_paths = [
            "./config/default.toml",
            "./config/production.toml",
            "/etc/chronos/config.toml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        use crate::Error;

        if self.server.port == 0 {
            return Err(Error::Config("Invalid server port".to_string()));
        }

        if self.store.pool.max == 0 {
            return Err(Error::Config("Store pool max must be > 0".to_string()));
        }

        if self.worker.concurrency == 0 {
            return Err(Error::Config("Worker concurrency must be > 0".to_string()));
        }

        if self.job.timeout_ms < 1_000 || self.job.timeout_ms > 3_600_000 {
            return Err(Error::Config(
                "Default job timeout must be between 1s and 1h".to_string(),
            ));
        }

        if self.job.max_retry_attempts > 10 {
            return Err(Error::Config("max_retry_attempts must be <= 10".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_graceful_shutdown")]
    pub graceful_shutdown_timeout_secs: u64,

    /// How often the scheduler loop materializes due repeatable fires
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            graceful_shutdown_timeout_secs: default_graceful_shutdown(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_graceful_shutdown() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    5
}

/// PostgreSQL store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_host")]
    pub host: String,

    #[serde(default = "default_store_port")]
    pub port: u16,

    #[serde(default = "default_store_name")]
    pub name: String,

    #[serde(default = "default_store_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_store_host(),
            port: default_store_port(),
            name: default_store_name(),
            user: default_store_user(),
            password: String::new(),
            pool: PoolConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Connection URL for sqlx
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

fn default_store_host() -> String {
    "localhost".to_string()
}

fn default_store_port() -> u16 {
    5432
}

fn default_store_name() -> String {
    "chronos".to_string()
}

fn default_store_user() -> String {
    "chronos".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_max")]
    pub max: u32,

    #[serde(default = "default_pool_min")]
    pub min: u32,

    #[serde(default = "default_pool_acquire")]
    pub acquire_secs: u64,

    #[serde(default = "default_pool_idle")]
    pub idle_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: default_pool_max(),
            min: default_pool_min(),
            acquire_secs: default_pool_acquire(),
            idle_secs: default_pool_idle(),
        }
    }
}

fn default_pool_max() -> u32 {
    20
}

fn default_pool_min() -> u32 {
    2
}

fn default_pool_acquire() -> u64 {
    30
}

fn default_pool_idle() -> u64 {
    600
}

/// Redis queue connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_host")]
    pub host: String,

    #[serde(default = "default_queue_port")]
    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_queue_retries")]
    pub max_retries_per_request: u32,

    /// Seconds after which an unacked in-flight envelope becomes visible
    /// again
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: default_queue_host(),
            port: default_queue_port(),
            password: None,
            max_retries_per_request: default_queue_retries(),
            stall_timeout_secs: default_stall_timeout(),
        }
    }
}

impl QueueConfig {
    /// Connection URL for the redis client
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/", password, self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

fn default_queue_host() -> String {
    "localhost".to_string()
}

fn default_queue_port() -> u16 {
    6379
}

fn default_queue_retries() -> u32 {
    3
}

fn default_stall_timeout() -> u64 {
    300
}

/// Per-job defaults applied when a create request leaves them unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    300_000
}

/// Worker pool tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub limiter: LimiterConfig,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            limiter: LimiterConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    5
}

/// Global dispatch rate cap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default = "default_limiter_max")]
    pub max: u32,

    #[serde(default = "default_limiter_window")]
    pub window_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max: default_limiter_max(),
            window_ms: default_limiter_window(),
        }
    }
}

fn default_limiter_max() -> u32 {
    100
}

fn default_limiter_window() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file_path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub email: EmailConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            email: EmailConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: None,
            smtp_user: None,
            smtp_pass: None,
            from_name: None,
            from_email: None,
        }
    }
}

fn default_true() -> bool {
    true
}
