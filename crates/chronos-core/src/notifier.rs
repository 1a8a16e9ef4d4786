//! Notification fan-out for attempt outcomes
//!
//! Emission is best-effort: a failed notification never alters job or
//! execution state. Trigger points live in the worker pipeline.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use crate::config::EmailConfig;
use crate::models::{Execution, Job, Owner};

/// Events the core emits to the owner's channel
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    JobCompleted {
        job: Job,
        execution: Execution,
        duration_ms: i64,
    },
    JobRetry {
        job: Job,
        attempt: u32,
        max_retries: u32,
        error_message: String,
    },
    MaxRetriesExceeded {
        job: Job,
        max_retries: u32,
        last_error: String,
    },
    JobFailed {
        job: Job,
        execution: Execution,
        error: String,
        attempts: u32,
    },
}

impl NotificationEvent {
    pub fn job(&self) -> &Job {
        match self {
            NotificationEvent::JobCompleted { job, .. } => job,
            NotificationEvent::JobRetry { job, .. } => job,
            NotificationEvent::MaxRetriesExceeded { job, .. } => job,
            NotificationEvent::JobFailed { job, .. } => job,
        }
    }

    /// Whether the owner's preferences opt into this event
    pub fn wanted_by(&self, owner: &Owner) -> bool {
        match self {
            NotificationEvent::JobCompleted { .. } => owner.notify_on_completion,
            _ => owner.notify_on_failure,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            NotificationEvent::JobCompleted { job, .. } => {
                format!("Job '{}' completed", job.name)
            }
            NotificationEvent::JobRetry { job, attempt, max_retries, .. } => {
                format!("Job '{}' retrying ({}/{})", job.name, attempt, max_retries)
            }
            NotificationEvent::MaxRetriesExceeded { job, .. } => {
                format!("Job '{}' permanently failed", job.name)
            }
            NotificationEvent::JobFailed { job, .. } => {
                format!("Job '{}' failed", job.name)
            }
        }
    }

    pub fn body(&self) -> String {
        match self {
            NotificationEvent::JobCompleted { job, duration_ms, .. } => format!(
                "Job '{}' ({}) completed successfully in {}ms.",
                job.name, job.id, duration_ms
            ),
            NotificationEvent::JobRetry {
                job,
                attempt,
                max_retries,
                error_message,
            } => format!(
                "Job '{}' ({}) failed on attempt {} of {} and will be retried.\n\nError: {}",
                job.name,
                job.id,
                attempt,
                max_retries + 1,
                error_message
            ),
            NotificationEvent::MaxRetriesExceeded {
                job,
                max_retries,
                last_error,
            } => format!(
                "Job '{}' ({}) exhausted its {} retries and will not run again.\n\nLast error: {}",
                job.name, job.id, max_retries, last_error
            ),
            NotificationEvent::JobFailed {
                job,
                error,
                attempts,
                ..
            } => format!(
                "Job '{}' ({}) failed after {} attempt(s).\n\nError: {}",
                job.name, job.id, attempts, error
            ),
        }
    }
}

/// Sink for notification events
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner: &Owner, event: &NotificationEvent) -> crate::Result<()>;
}

/// Drops every event; used when notifications are disabled and in tests
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _owner: &Owner, event: &NotificationEvent) -> crate::Result<()> {
        debug!(job_id = %event.job().id, "notification suppressed");
        Ok(())
    }
}

/// Email sink; the SMTP transport is built once per process and reused
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailNotifier {
    pub fn from_config(config: &EmailConfig) -> crate::Result<Self> {
        let host = config
            .smtp_host
            .as_ref()
            .ok_or_else(|| crate::Error::config("notifier requires notifications.email.smtp_host"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| crate::Error::config(format!("smtp relay: {}", e)))?;
        if let Some(port) = config.smtp_port {
            builder = builder.port(port);
        }
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = match (&config.from_name, &config.from_email) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (_, Some(email)) => email.clone(),
            _ => return Err(crate::Error::config("notifier requires a from address")),
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, owner: &Owner, event: &NotificationEvent) -> crate::Result<()> {
        if !event.wanted_by(owner) {
            return Ok(());
        }

        let message = Message::builder()
            .from(self.from.parse().map_err(|e| {
                crate::Error::config(format!("invalid notifier from address: {}", e))
            })?)
            .to(owner.email.parse().map_err(|e| {
                crate::Error::Other(format!("invalid owner email: {}", e))
            })?)
            .subject(event.subject())
            .body(event.body())
            .map_err(|e| crate::Error::Other(format!("message build: {}", e)))?;

        if let Err(e) = self.transport.send(message).await {
            // Best-effort contract: log and swallow
            warn!(owner = %owner.email, error = %e, "notification delivery failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::test_job;
    use chrono::TimeZone;

    fn owner(completion: bool, failure: bool) -> Owner {
        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut owner = Owner::new("ops@example.com", now);
        owner.notify_on_completion = completion;
        owner.notify_on_failure = failure;
        owner
    }

    #[test]
    fn test_opt_in_routing() {
        let job = test_job();
        let execution = Execution::start(
            job.id,
            uuid::Uuid::new_v4(),
            1,
            None,
            "w",
            serde_json::json!({}),
            chrono::Utc::now(),
        );

        let completed = NotificationEvent::JobCompleted {
            job: job.clone(),
            execution,
            duration_ms: 120,
        };
        assert!(!completed.wanted_by(&owner(false, true)));
        assert!(completed.wanted_by(&owner(true, false)));

        let exceeded = NotificationEvent::MaxRetriesExceeded {
            job,
            max_retries: 3,
            last_error: "boom".into(),
        };
        assert!(exceeded.wanted_by(&owner(false, true)));
        assert!(!exceeded.wanted_by(&owner(true, false)));
    }

    #[test]
    fn test_bodies_name_the_job() {
        let job = test_job();
        let event = NotificationEvent::JobRetry {
            job: job.clone(),
            attempt: 1,
            max_retries: 3,
            error_message: "request failed with status 500".into(),
        };
        assert!(event.subject().contains("retrying"));
        assert!(event.body().contains(&job.id.to_string()));
        assert!(event.body().contains("status 500"));
    }

    #[test]
    fn test_job_failed_event_carries_attempts_and_error() {
        let job = test_job();
        let execution = Execution::start(
            job.id,
            uuid::Uuid::new_v4(),
            3,
            Some(uuid::Uuid::new_v4()),
            "w",
            serde_json::json!({}),
            chrono::Utc::now(),
        );

        let event = NotificationEvent::JobFailed {
            job: job.clone(),
            execution,
            error: "request failed with status 500".into(),
            attempts: 3,
        };
        assert_eq!(event.subject(), format!("Job '{}' failed", job.name));
        assert!(event.body().contains(&job.id.to_string()));
        assert!(event.body().contains("3 attempt(s)"));
        assert!(event.body().contains("status 500"));
        // Routed by the failure opt-in
        assert!(event.wanted_by(&owner(false, true)));
        assert!(!event.wanted_by(&owner(true, false)));
    }
}
