//! Durable ready queue of attempt envelopes
//!
//! The queue is the single source of truth for pending work. It supports
//! immediate enqueue into a priority band, delayed enqueue with an
//! absolute visibility time, and repeatable registrations that
//! materialize one envelope per calendar firing. Envelopes preserve
//! priority order among visible items and FIFO order within a band; an
//! unacked in-flight envelope becomes visible again after a bounded
//! stall interval.

pub mod memory;
pub mod redis;

pub use memory::MemoryQueue;
pub use redis::{QueuePool, RedisQueue};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;

/// Priority band of a visible envelope. Manual triggers enqueue Critical;
/// job priority 0..=10 maps onto High/Normal/Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBand {
    Critical,
    High,
    Normal,
    Low,
}

impl PriorityBand {
    /// Bands in dispatch order
    pub fn all() -> [PriorityBand; 4] {
        [
            PriorityBand::Critical,
            PriorityBand::High,
            PriorityBand::Normal,
            PriorityBand::Low,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityBand::Critical => "critical",
            PriorityBand::High => "high",
            PriorityBand::Normal => "normal",
            PriorityBand::Low => "low",
        }
    }
}

impl fmt::Display for PriorityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A queue message referencing one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Delivery identity; lets workers treat redeliveries idempotently
    pub id: Uuid,

    pub job_id: Uuid,

    /// Attempts already consumed; the receiving worker runs attempt
    /// `attempts_made + 1`
    pub attempts_made: u32,

    pub enqueued_at: DateTime<Utc>,

    /// Terminal execution this retry follows, None for a chain head
    pub previous_execution_id: Option<Uuid>,
}

impl Envelope {
    pub fn new(job_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            attempts_made: 0,
            enqueued_at: now,
            previous_execution_id: None,
        }
    }

    /// Envelope for the retry following a failed attempt
    pub fn retry_of(
        job_id: Uuid,
        attempts_made: u32,
        previous_execution_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            attempts_made,
            enqueued_at: now,
            previous_execution_id: Some(previous_execution_id),
        }
    }
}

/// A queue-side object that materializes one envelope per calendar firing
/// until explicitly removed. Owned by the planner; workers never touch
/// repeatables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatableRegistration {
    pub job_id: Uuid,

    pub cron_expression: String,

    pub timezone: String,

    pub next_fire_at: DateTime<Utc>,
}

/// Queue depth snapshot
#[derive(Debug, Default, Clone, Serialize)]
pub struct QueueStats {
    pub ready_critical: usize,
    pub ready_high: usize,
    pub ready_normal: usize,
    pub ready_low: usize,
    pub delayed: usize,
    pub processing: usize,
    pub repeatables: usize,
}

impl QueueStats {
    pub fn total_ready(&self) -> usize {
        self.ready_critical + self.ready_high + self.ready_normal + self.ready_low
    }
}

/// Durable FIFO/priority queue of attempt envelopes
#[async_trait]
pub trait ReadyQueue: Send + Sync {
    /// Enqueue a visible envelope into a priority band
    async fn enqueue(&self, envelope: Envelope, band: PriorityBand) -> Result<()>;

    /// Enqueue an envelope that becomes visible at an absolute instant
    async fn enqueue_delayed(
        &self,
        envelope: Envelope,
        band: PriorityBand,
        visible_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Pop the next visible envelope: due delayed and stalled entries are
    /// promoted first, then bands are drained in priority order, FIFO
    /// within a band. The popped envelope stays in-flight until acked.
    async fn pop(&self) -> Result<Option<Envelope>>;

    /// Acknowledge a terminal outcome; removes the envelope permanently
    async fn ack(&self, envelope_id: Uuid) -> Result<()>;

    /// Return an in-flight envelope to its band for redelivery
    async fn nack(&self, envelope_id: Uuid) -> Result<()>;

    /// Drop every pending/delayed envelope and repeatable registration
    /// for a job
    async fn remove_job(&self, job_id: Uuid) -> Result<()>;

    /// Register (or replace) the repeatable entry for a recurring job
    async fn register_repeatable(&self, registration: RepeatableRegistration) -> Result<()>;

    /// Remove a recurring job's repeatable entry
    async fn remove_repeatable(&self, job_id: Uuid) -> Result<()>;

    /// Repeatable entries whose next fire is due at `now`
    async fn due_repeatables(&self, now: DateTime<Utc>) -> Result<Vec<RepeatableRegistration>>;

    /// Move a repeatable entry to its next firing instant
    async fn advance_repeatable(&self, job_id: Uuid, next_fire_at: DateTime<Utc>) -> Result<()>;

    /// Depth snapshot
    async fn stats(&self) -> Result<QueueStats>;
}

/// Envelope plus the band it dispatches from; what implementations
/// actually persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QueuedEnvelope {
    pub envelope: Envelope,
    pub band: PriorityBand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_order() {
        let bands = PriorityBand::all();
        assert_eq!(bands[0], PriorityBand::Critical);
        assert_eq!(bands[3], PriorityBand::Low);
    }

    #[test]
    fn test_envelope_retry_linkage() {
        let now = Utc::now();
        let job_id = Uuid::new_v4();
        let first = Envelope::new(job_id, now);
        assert_eq!(first.attempts_made, 0);
        assert!(first.previous_execution_id.is_none());

        let prev_execution = Uuid::new_v4();
        let retry = Envelope::retry_of(job_id, 1, prev_execution, now);
        assert_eq!(retry.attempts_made, 1);
        assert_eq!(retry.previous_execution_id, Some(prev_execution));
        assert_ne!(retry.id, first.id);
    }
}
