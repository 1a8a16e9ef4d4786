//! Webhook executor adapter
//!
//! Same transport as the http adapter but the method defaults to POST
//! and, when the payload carries a `secret`, requests are signed with
//! `X-Webhook-Signature: hex(hmac-sha256(secret, canonical_json(body)))`.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::executor::{AdapterError, HttpExecutor, JobExecutor, Payload, WebhookPayload};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

pub struct WebhookExecutor {
    transport: HttpExecutor,
}

impl WebhookExecutor {
    pub fn new() -> Self {
        Self {
            transport: HttpExecutor::new(),
        }
    }
}

impl Default for WebhookExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobExecutor for WebhookExecutor {
    async fn execute(&self, payload: &Payload) -> Result<Value, AdapterError> {
        let Payload::Webhook(WebhookPayload {
            url,
            method,
            headers,
            body,
            secret,
            timeout_ms,
        }) = payload
        else {
            return Err(AdapterError::InvalidPayload(
                "webhook executor requires a webhook payload".to_string(),
            ));
        };

        let mut headers = headers.clone();
        if let Some(secret) = secret {
            let data = body.clone().unwrap_or(Value::Null);
            headers.insert(SIGNATURE_HEADER.to_string(), sign(secret, &data)?);
        }

        self.transport
            .request(url, method, &headers, body.as_ref(), *timeout_ms)
            .await
    }
}

/// Hex HMAC-SHA256 over the canonical JSON rendering of `data`
pub fn sign(secret: &str, data: &Value) -> Result<String, AdapterError> {
    let canonical = canonical_json(data);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AdapterError::InvalidPayload(format!("invalid secret: {}", e)))?;
    mac.update(canonical.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// JSON rendering with object keys sorted at every level, so both sides
/// of the webhook can reproduce the signed bytes
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(key).expect("string serializes"),
                        canonical_json(&map[key])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        other => serde_json::to_string(other).expect("scalar serializes"),
    }
}
