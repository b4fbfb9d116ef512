//! Authoritative in-process queue store
//!
//! The registry sits behind one lock that is held for the whole of each
//! logical operation, so joins from concurrent requests are serialized into a
//! single global order.

use crate::error::{QueueError, Result};
use crate::metrics::MetricsCollector;
use crate::queue::QueueRegistry;
use crate::store::QueueStore;
use crate::types::{
    CreateQueueRequest, JoinRequest, LeaveRequest, QueueDetail, QueueMeta, DEFAULT_SAMPLE_CAPACITY,
};
use crate::utils::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Volatile queue store owning the authoritative registry
pub struct InMemoryQueueStore {
    registry: RwLock<QueueRegistry>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl InMemoryQueueStore {
    /// Create a store using the wall clock
    pub fn new(sample_capacity: usize) -> Self {
        Self::with_clock(sample_capacity, Arc::new(SystemClock))
    }

    /// Create a store driven by a custom clock
    pub fn with_clock(sample_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let registry = QueueRegistry::new(sample_capacity, clock.now());
        Self {
            registry: RwLock::new(registry),
            clock,
            metrics: None,
        }
    }

    /// Report observed service durations to the given collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run `op` with exclusive access to the registry
    fn write<R>(&self, op: impl FnOnce(&mut QueueRegistry, DateTime<Utc>) -> Result<R>) -> Result<R> {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| QueueError::internal("Failed to acquire registry write lock"))?;
        op(&mut registry, self.clock.now())
    }

    fn read<R>(&self, op: impl FnOnce(&QueueRegistry) -> R) -> Result<R> {
        let registry = self
            .registry
            .read()
            .map_err(|_| QueueError::internal("Failed to acquire registry read lock"))?;
        Ok(op(&registry))
    }

    /// Number of queues currently held
    pub fn queue_count(&self) -> Result<usize> {
        self.read(QueueRegistry::len)
    }

    /// Members waiting across all queues
    pub fn members_waiting(&self) -> Result<usize> {
        self.read(|registry| registry.iter().map(|queue| queue.len()).sum())
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CAPACITY)
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<QueueMeta>> {
        self.read(QueueRegistry::list)
    }

    async fn create(&self, request: CreateQueueRequest) -> Result<QueueMeta> {
        self.write(|registry, now| registry.create(&request, now))
    }

    async fn detail(&self, queue_id: &str) -> Result<QueueDetail> {
        self.write(|registry, now| Ok(registry.ensure(queue_id, None, now).detail()))
    }

    async fn join(&self, queue_id: &str, request: JoinRequest) -> Result<usize> {
        let member_id = request.validate()?;
        self.write(|registry, now| {
            let queue = registry.ensure(queue_id, None, now);
            let position = queue.join(&member_id, request.display_name, request.handle, now);
            debug!(
                "Member '{}' at position {} in queue '{}'",
                member_id,
                position,
                queue.id()
            );
            Ok(position)
        })
    }

    async fn leave(&self, queue_id: &str, request: LeaveRequest) -> Result<()> {
        let member_id = request.validate()?;
        let served = self.write(|registry, now| {
            Ok(registry
                .ensure(queue_id, None, now)
                .leave(&member_id, now)
                .map(|member| now - member.joined_at))
        })?;

        if let (Some(metrics), Some(elapsed)) = (&self.metrics, served) {
            if let Ok(elapsed) = elapsed.to_std() {
                metrics.record_service_duration(elapsed);
            }
        }
        Ok(())
    }

    async fn clear(&self, queue_id: &str) -> Result<()> {
        self.write(|registry, now| {
            registry.ensure(queue_id, None, now).clear();
            debug!("Cleared queue '{}'", queue_id);
            Ok(())
        })
    }

    async fn delete(&self, queue_id: &str) -> Result<()> {
        self.write(|registry, now| registry.delete(queue_id, now))
    }
}
