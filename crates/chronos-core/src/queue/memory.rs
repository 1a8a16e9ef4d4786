//! In-memory ready queue used by tests and single-process setups

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::Result;
use crate::queue::{
    Envelope, PriorityBand, QueueStats, QueuedEnvelope, ReadyQueue, RepeatableRegistration,
};

struct Inner {
    ready: HashMap<PriorityBand, VecDeque<QueuedEnvelope>>,
    delayed: Vec<(DateTime<Utc>, QueuedEnvelope)>,
    processing: HashMap<Uuid, QueuedEnvelope>,
    repeatables: HashMap<Uuid, RepeatableRegistration>,
}

impl Inner {
    fn new() -> Self {
        let mut ready = HashMap::new();
        for band in PriorityBand::all() {
            ready.insert(band, VecDeque::new());
        }
        Self {
            ready,
            delayed: Vec::new(),
            processing: HashMap::new(),
            repeatables: HashMap::new(),
        }
    }

    fn promote_due(&mut self, now: DateTime<Utc>) {
        let mut still_delayed = Vec::new();
        for (visible_at, queued) in self.delayed.drain(..) {
            if visible_at <= now {
                self.ready
                    .get_mut(&queued.band)
                    .expect("band exists")
                    .push_back(queued);
            } else {
                still_delayed.push((visible_at, queued));
            }
        }
        self.delayed = still_delayed;
    }
}

/// Deterministic queue with the same visibility semantics as the Redis
/// implementation
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl MemoryQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            clock,
        }
    }

    /// Delayed entries with their visibility instants, for assertions
    pub async fn delayed_entries(&self) -> Vec<(DateTime<Utc>, Envelope)> {
        let inner = self.inner.lock().await;
        inner
            .delayed
            .iter()
            .map(|(at, queued)| (*at, queued.envelope.clone()))
            .collect()
    }

    /// Currently registered repeatable for a job, for assertions
    pub async fn repeatable_for(&self, job_id: Uuid) -> Option<RepeatableRegistration> {
        self.inner.lock().await.repeatables.get(&job_id).cloned()
    }
}

#[async_trait]
impl ReadyQueue for MemoryQueue {
    async fn enqueue(&self, envelope: Envelope, band: PriorityBand) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .ready
            .get_mut(&band)
            .expect("band exists")
            .push_back(QueuedEnvelope { envelope, band });
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        envelope: Envelope,
        band: PriorityBand,
        visible_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .delayed
            .push((visible_at, QueuedEnvelope { envelope, band }));
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Envelope>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.promote_due(now);

        for band in PriorityBand::all() {
            if let Some(queued) = inner.ready.get_mut(&band).expect("band exists").pop_front() {
                let envelope = queued.envelope.clone();
                inner.processing.insert(envelope.id, queued);
                return Ok(Some(envelope));
            }
        }
        Ok(None)
    }

    async fn ack(&self, envelope_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.processing.remove(&envelope_id);
        Ok(())
    }

    async fn nack(&self, envelope_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(queued) = inner.processing.remove(&envelope_id) {
            inner
                .ready
                .get_mut(&queued.band)
                .expect("band exists")
                .push_back(queued);
        }
        Ok(())
    }

    async fn remove_job(&self, job_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for band in PriorityBand::all() {
            inner
                .ready
                .get_mut(&band)
                .expect("band exists")
                .retain(|queued| queued.envelope.job_id != job_id);
        }
        inner
            .delayed
            .retain(|(_, queued)| queued.envelope.job_id != job_id);
        inner.repeatables.remove(&job_id);
        Ok(())
    }

    async fn register_repeatable(&self, registration: RepeatableRegistration) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.repeatables.insert(registration.job_id, registration);
        Ok(())
    }

    async fn remove_repeatable(&self, job_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.repeatables.remove(&job_id);
        Ok(())
    }

    async fn due_repeatables(&self, now: DateTime<Utc>) -> Result<Vec<RepeatableRegistration>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .repeatables
            .values()
            .filter(|registration| registration.next_fire_at <= now)
            .cloned()
            .collect())
    }

    async fn advance_repeatable(&self, job_id: Uuid, next_fire_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(registration) = inner.repeatables.get_mut(&job_id) {
            registration.next_fire_at = next_fire_at;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let inner = self.inner.lock().await;
        let depth = |band: PriorityBand| inner.ready.get(&band).map(|q| q.len()).unwrap_or(0);
        Ok(QueueStats {
            ready_critical: depth(PriorityBand::Critical),
            ready_high: depth(PriorityBand::High),
            ready_normal: depth(PriorityBand::Normal),
            ready_low: depth(PriorityBand::Low),
            delayed: inner.delayed.len(),
            processing: inner.processing.len(),
            repeatables: inner.repeatables.len(),
        })
    }
}
