//! Job owners and their notification preferences

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owning user of a set of jobs. Deleting an owner cascades its jobs.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Owner {
    pub id: Uuid,

    pub email: String,

    /// Opt-in for job_completed events
    pub notify_on_completion: bool,

    /// Opt-in for retry / permanent-failure events
    pub notify_on_failure: bool,

    pub created_at: DateTime<Utc>,
}

impl Owner {
    pub fn new(email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            notify_on_completion: false,
            notify_on_failure: true,
            created_at: now,
        }
    }
}
