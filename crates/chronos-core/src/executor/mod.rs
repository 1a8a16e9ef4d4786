//! Type-specific executor adapters
//!
//! The worker pipeline hands an attempt's payload to the adapter
//! registered for its job type. Adapters validate their own payload
//! shape; the core treats payloads as opaque bags.

pub mod custom;
pub mod email;
pub mod http;
pub mod script;
pub mod webhook;

pub use custom::{CustomExecutor, CustomHandler};
pub use email::EmailExecutor;
pub use http::HttpExecutor;
pub use script::ScriptExecutor;
pub use webhook::WebhookExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Job, JobType};

/// Adapter-level error; recorded on the execution and fed into the
/// retry decision, never surfaced above the worker
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Failed(String),

    #[error("no executor registered for job type: {0}")]
    UnknownJobType(String),

    #[error("unknown custom handler: {0}")]
    UnknownHandler(String),
}

impl AdapterError {
    /// Configuration problems rather than transient execution failures
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AdapterError::UnknownJobType(_) | AdapterError::UnknownHandler(_)
        )
    }
}

/// Typed view over a job's payload bag, selected by job type
#[derive(Debug, Clone)]
pub enum Payload {
    Http(HttpPayload),
    Webhook(WebhookPayload),
    Script(ScriptPayload),
    Email(EmailPayload),
    Custom(CustomPayload),
}

impl Payload {
    /// Deserialize the job's payload for its declared type
    pub fn from_job(job: &Job) -> Result<Self, AdapterError> {
        let payload = job.payload.clone();
        let parsed = match job.job_type {
            JobType::Http => Payload::Http(parse(payload)?),
            JobType::Webhook => Payload::Webhook(parse(payload)?),
            JobType::Script => Payload::Script(parse(payload)?),
            JobType::Email => Payload::Email(parse(payload)?),
            JobType::Custom => Payload::Custom(parse(payload)?),
        };
        Ok(parsed)
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, AdapterError> {
    serde_json::from_value(value).map_err(|e| AdapterError::InvalidPayload(e.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpPayload {
    pub url: String,

    #[serde(default = "default_get")]
    pub method: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default = "default_http_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub url: String,

    #[serde(default = "default_post")]
    pub method: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body: Option<Value>,

    /// When present, requests carry an HMAC-SHA256 signature header
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_http_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptPayload {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_script_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    pub subject: String,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub html: Option<String>,

    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPayload {
    pub handler: String,

    #[serde(default = "default_bag")]
    pub data: Value,
}

fn default_get() -> String {
    "GET".to_string()
}

fn default_post() -> String {
    "POST".to_string()
}

fn default_http_timeout() -> u64 {
    30_000
}

fn default_script_timeout() -> u64 {
    60_000
}

fn default_bag() -> Value {
    serde_json::json!({})
}

/// A single executor adapter
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run the payload to completion; the caller enforces the hard
    /// per-attempt deadline
    async fn execute(&self, payload: &Payload) -> Result<Value, AdapterError>;
}

/// Dispatch table from job type to adapter
pub struct ExecutorRegistry {
    executors: HashMap<JobType, Arc<dyn JobExecutor>>,
}

impl ExecutorRegistry {
    /// Empty registry; adapters are attached with `register`
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Registry with every shipped adapter attached
    pub fn with_defaults(email: EmailExecutor, custom: CustomExecutor) -> Self {
        let mut registry = Self::new();
        registry.register(JobType::Http, Arc::new(HttpExecutor::new()));
        registry.register(JobType::Webhook, Arc::new(WebhookExecutor::new()));
        registry.register(JobType::Script, Arc::new(ScriptExecutor::new()));
        registry.register(JobType::Email, Arc::new(email));
        registry.register(JobType::Custom, Arc::new(custom));
        registry
    }

    pub fn register(&mut self, job_type: JobType, executor: Arc<dyn JobExecutor>) {
        self.executors.insert(job_type, executor);
    }

    /// Parse the job's payload and run the adapter for its type
    pub async fn execute(&self, job: &Job) -> Result<Value, AdapterError> {
        let executor = self
            .executors
            .get(&job.job_type)
            .ok_or_else(|| AdapterError::UnknownJobType(job.job_type.to_string()))?;
        let payload = Payload::from_job(job)?;
        executor.execute(&payload).await
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
