//! Queue registry
//!
//! Owns every queue in creation order and enforces that the reserved
//! `default` queue exists at all times.

use crate::error::{QueueError, Result};
use crate::identity::resolve_queue_id;
use crate::queue::state::QueueState;
use crate::types::{
    CreateQueueRequest, QueueId, QueueMeta, DEFAULT_QUEUE_ID, DEFAULT_QUEUE_NAME,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

/// Collection of queues keyed by id, iterated in insertion order
#[derive(Debug, Clone)]
pub struct QueueRegistry {
    queues: HashMap<QueueId, QueueState>,
    order: Vec<QueueId>,
    sample_capacity: usize,
}

impl QueueRegistry {
    /// Create a registry holding only the `default` queue
    pub fn new(sample_capacity: usize, now: DateTime<Utc>) -> Self {
        let mut registry = Self {
            queues: HashMap::new(),
            order: Vec::new(),
            sample_capacity,
        };
        registry.ensure(DEFAULT_QUEUE_ID, None, now);
        registry
    }

    /// Rebuild a registry from restored queues, in the given order.
    ///
    /// Later duplicates of an id are dropped and `default` is added if missing.
    pub fn from_queues(
        queues: impl IntoIterator<Item = QueueState>,
        sample_capacity: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut registry = Self {
            queues: HashMap::new(),
            order: Vec::new(),
            sample_capacity,
        };
        for queue in queues {
            if !registry.queues.contains_key(queue.id()) {
                registry.insert(queue);
            }
        }
        registry.ensure(DEFAULT_QUEUE_ID, None, now);
        registry
    }

    pub fn sample_capacity(&self) -> usize {
        self.sample_capacity
    }

    /// Return the queue with `id`, creating it if needed.
    ///
    /// An empty id addresses the `default` queue. A new queue is named
    /// `fallback_name`, else "Main queue" for `default`, else its id.
    pub fn ensure(
        &mut self,
        id: &str,
        fallback_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> &mut QueueState {
        let id = match id.trim() {
            "" => DEFAULT_QUEUE_ID,
            trimmed => trimmed,
        };
        let fallback_name = fallback_name.map(str::trim).filter(|n| !n.is_empty());

        if !self.queues.contains_key(id) {
            self.order.push(id.to_string());
        }
        let sample_capacity = self.sample_capacity;
        let queue = self.queues.entry(id.to_string()).or_insert_with(|| {
            let name = match fallback_name {
                Some(name) => name,
                None if id == DEFAULT_QUEUE_ID => DEFAULT_QUEUE_NAME,
                None => id,
            };
            QueueState::new(id, name, now, sample_capacity)
        });
        if let Some(name) = fallback_name {
            queue.name_if_empty(name);
        }
        queue
    }

    /// Create a new queue with a unique id derived from the request
    pub fn create(&mut self, request: &CreateQueueRequest, now: DateTime<Utc>) -> Result<QueueMeta> {
        let name = request.validate()?;
        let requested = request.requested_id();
        let id = resolve_queue_id(&name, requested.as_deref(), now, |candidate| {
            self.queues.contains_key(candidate)
        });

        let queue = QueueState::new(id.clone(), name, now, self.sample_capacity);
        let meta = queue.meta();
        self.insert(queue);

        info!("Created queue '{}' ({})", meta.id, meta.name);
        Ok(meta)
    }

    /// Metadata of all queues in creation order
    pub fn list(&self) -> Vec<QueueMeta> {
        self.iter().map(QueueState::meta).collect()
    }

    /// Remove a queue. The `default` queue cannot be removed.
    pub fn delete(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(QueueError::validation("queueId required"));
        }
        if id == DEFAULT_QUEUE_ID {
            return Err(QueueError::InvalidOperation {
                reason: "default queue cannot be deleted".to_string(),
            });
        }
        if self.queues.remove(id).is_none() {
            return Err(QueueError::NotFound {
                queue_id: id.to_string(),
            });
        }
        self.order.retain(|queue_id| queue_id != id);
        info!("Deleted queue '{}'", id);

        if self.queues.is_empty() {
            self.ensure(DEFAULT_QUEUE_ID, None, now);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&QueueState> {
        self.queues.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut QueueState> {
        self.queues.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.queues.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Id of the first queue in creation order
    pub fn first_id(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Queues in creation order
    pub fn iter(&self) -> impl Iterator<Item = &QueueState> {
        self.order.iter().filter_map(|id| self.queues.get(id))
    }

    fn insert(&mut self, queue: QueueState) {
        self.order.push(queue.id().to_string());
        self.queues.insert(queue.id().to_string(), queue);
    }
}
