//! HTTP executor adapter
//!
//! Success iff the response status is in [200, 300). The result bag
//! carries `statusCode`, `headers` and `body` (JSON-parsed when the
//! response is JSON).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::executor::{AdapterError, HttpPayload, JobExecutor, Payload};

pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub(crate) async fn request(
        &self,
        url: &str,
        method: &str,
        headers: &HashMap<String, String>,
        body: Option<&Value>,
        timeout_ms: u64,
    ) -> Result<Value, AdapterError> {
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| AdapterError::InvalidPayload(format!("invalid method: {}", method)))?;

        let mut request = self
            .client
            .request(method, url)
            .timeout(Duration::from_millis(timeout_ms));

        for (name, value) in headers {
            request = request.header(name, value);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::Failed(format!("request error: {}", e)))?;

        let status = response.status();
        let response_headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::Failed(format!("body read error: {}", e)))?;

        // JSON bodies come back structured, everything else as a string
        let body_value = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if !(200..300).contains(&status.as_u16()) {
            return Err(AdapterError::Failed(format!(
                "request failed with status {}",
                status.as_u16()
            )));
        }

        Ok(serde_json::json!({
            "statusCode": status.as_u16(),
            "headers": response_headers,
            "body": body_value,
        }))
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobExecutor for HttpExecutor {
    async fn execute(&self, payload: &Payload) -> Result<Value, AdapterError> {
        let Payload::Http(HttpPayload {
            url,
            method,
            headers,
            body,
            timeout_ms,
        }) = payload
        else {
            return Err(AdapterError::InvalidPayload(
                "http executor requires an http payload".to_string(),
            ));
        };

        self.request(url, method, headers, body.as_ref(), *timeout_ms)
            .await
    }
}
