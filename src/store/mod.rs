//! Queue store capability and its implementations
//!
//! Every backend exposes the same queue semantics: the authoritative
//! in-process registry, the HTTP client that reaches it remotely, and the
//! locally persisted mirror used while the authoritative side is unreachable.

pub mod memory;
pub mod remote;
pub mod snapshot;

use crate::error::Result;
use crate::types::{
    CreateQueueRequest, JoinRequest, LeaveRequest, QueueDetail, QueueMeta, QueueView,
    DEFAULT_QUEUE_ID,
};
use async_trait::async_trait;

// Re-export commonly used types
pub use memory::InMemoryQueueStore;
pub use remote::RemoteQueueStore;
pub use snapshot::{MirrorSnapshot, QueueSnapshot, SnapshotQueueStore};

/// Operations every queue backend supports
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// All queues in creation order
    async fn list(&self) -> Result<Vec<QueueMeta>>;

    /// Create a queue with a unique id
    async fn create(&self, request: CreateQueueRequest) -> Result<QueueMeta>;

    /// Detail of a queue, creating it if absent
    async fn detail(&self, queue_id: &str) -> Result<QueueDetail>;

    /// Join a queue (creating it if absent); returns the 1-based position
    async fn join(&self, queue_id: &str, request: JoinRequest) -> Result<usize>;

    /// Leave a queue (creating it if absent)
    async fn leave(&self, queue_id: &str, request: LeaveRequest) -> Result<()>;

    /// Remove all members and reset the estimator
    async fn clear(&self, queue_id: &str) -> Result<()>;

    /// Delete a queue other than `default`
    async fn delete(&self, queue_id: &str) -> Result<()>;

    /// Queue list plus the detail of `queue_id`.
    ///
    /// An id missing from a non-empty list resolves to the first listed queue.
    async fn select(&self, queue_id: &str) -> Result<QueueView> {
        let queues = self.list().await?;
        let wanted = match queue_id.trim() {
            "" => DEFAULT_QUEUE_ID,
            trimmed => trimmed,
        };
        let resolved = match queues.first() {
            Some(first) if !queues.iter().any(|q| q.id == wanted) => first.id.clone(),
            _ => wanted.to_string(),
        };
        let selected = self.detail(&resolved).await?;
        Ok(QueueView { queues, selected })
    }
}
