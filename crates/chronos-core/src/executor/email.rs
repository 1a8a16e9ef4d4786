//! Email executor adapter over SMTP
//!
//! The transport is built once per process and reused. Success returns
//! `{messageId, to, subject}`.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::executor::{AdapterError, EmailPayload, JobExecutor, Payload};

pub struct EmailExecutor {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    default_from: Option<String>,
}

impl EmailExecutor {
    /// Build from configuration; without an SMTP host the adapter
    /// reports a configuration failure at execution time
    pub fn from_config(config: &EmailConfig) -> Result<Self, crate::Error> {
        let transport = match &config.smtp_host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                    .map_err(|e| crate::Error::config(format!("smtp relay: {}", e)))?;
                if let Some(port) = config.smtp_port {
                    builder = builder.port(port);
                }
                if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_pass) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                Some(builder.build())
            }
            None => None,
        };

        let default_from = match (&config.from_name, &config.from_email) {
            (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
            (None, Some(email)) => Some(email.clone()),
            _ => None,
        };

        Ok(Self {
            transport,
            default_from,
        })
    }

    fn build_message(
        &self,
        payload: &EmailPayload,
        message_id: &str,
    ) -> Result<Message, AdapterError> {
        let from = payload
            .from
            .clone()
            .or_else(|| self.default_from.clone())
            .ok_or_else(|| {
                AdapterError::InvalidPayload("no from address configured".to_string())
            })?;

        let from: Mailbox = from
            .parse()
            .map_err(|e| AdapterError::InvalidPayload(format!("invalid from address: {}", e)))?;
        let to: Mailbox = payload
            .to
            .parse()
            .map_err(|e| AdapterError::InvalidPayload(format!("invalid to address: {}", e)))?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(&payload.subject)
            .message_id(Some(message_id.to_string()));

        let message = match (&payload.text, &payload.html) {
            (Some(text), Some(html)) => builder
                .multipart(MultiPart::alternative_plain_html(
                    text.clone(),
                    html.clone(),
                ))
                .map_err(|e| AdapterError::Failed(format!("message build: {}", e)))?,
            (None, Some(html)) => builder
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                )
                .map_err(|e| AdapterError::Failed(format!("message build: {}", e)))?,
            (text, None) => builder
                .body(text.clone().unwrap_or_default())
                .map_err(|e| AdapterError::Failed(format!("message build: {}", e)))?,
        };

        Ok(message)
    }
}

#[async_trait]
impl JobExecutor for EmailExecutor {
    async fn execute(&self, payload: &Payload) -> Result<Value, AdapterError> {
        let Payload::Email(email) = payload else {
            return Err(AdapterError::InvalidPayload(
                "email executor requires an email payload".to_string(),
            ));
        };

        let transport = self.transport.as_ref().ok_or_else(|| {
            AdapterError::Failed("smtp transport not configured".to_string())
        })?;

        let message_id = format!("<{}@chronos>", Uuid::new_v4());
        let message = self.build_message(email, &message_id)?;

        transport
            .send(message)
            .await
            .map_err(|e| AdapterError::Failed(format!("smtp send: {}", e)))?;

        Ok(serde_json::json!({
            "messageId": message_id,
            "to": email.to,
            "subject": email.subject,
        }))
    }
}
