//! Custom executor adapter
//!
//! Dispatches to named handlers in a process-local registry.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::executor::{AdapterError, CustomPayload, JobExecutor, Payload};

/// A user-registered handler for `custom` jobs
#[async_trait]
pub trait CustomHandler: Send + Sync {
    async fn run(&self, data: Value) -> Result<Value, AdapterError>;
}

pub struct CustomExecutor {
    handlers: DashMap<String, Arc<dyn CustomHandler>>,
}

impl CustomExecutor {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn CustomHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for CustomExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobExecutor for CustomExecutor {
    async fn execute(&self, payload: &Payload) -> Result<Value, AdapterError> {
        let Payload::Custom(CustomPayload { handler, data }) = payload else {
            return Err(AdapterError::InvalidPayload(
                "custom executor requires a custom payload".to_string(),
            ));
        };

        let entry = self
            .handlers
            .get(handler)
            .ok_or_else(|| AdapterError::UnknownHandler(handler.clone()))?;
        let handler = entry.value().clone();
        drop(entry);

        handler.run(data.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    #[async_trait]
    impl CustomHandler for Doubler {
        async fn run(&self, data: Value) -> Result<Value, AdapterError> {
            let n = data["n"]
                .as_i64()
                .ok_or_else(|| AdapterError::InvalidPayload("missing n".into()))?;
            Ok(serde_json::json!({"n": n * 2}))
        }
    }

    #[tokio::test]
    async fn test_dispatches_to_registered_handler() {
        let executor = CustomExecutor::new();
        executor.register("double", Arc::new(Doubler));

        let result = executor
            .execute(&Payload::Custom(CustomPayload {
                handler: "double".into(),
                data: serde_json::json!({"n": 21}),
            }))
            .await
            .unwrap();
        assert_eq!(result["n"], 42);
    }

    #[tokio::test]
    async fn test_unknown_handler_is_configuration_error() {
        let executor = CustomExecutor::new();
        let err = executor
            .execute(&Payload::Custom(CustomPayload {
                handler: "missing".into(),
                data: serde_json::json!({}),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::UnknownHandler(_)));
        assert!(err.is_configuration());
    }
}
