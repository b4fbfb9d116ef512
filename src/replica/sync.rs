//! Authoritative-first orchestration with local mirror fallback
//!
//! Every operation is attempted once against the authoritative store. If that
//! attempt fails with a transport error (including a timeout) the identical
//! operation runs against the mirror and the result is flagged as degraded.
//! Any other error is returned as-is. There is no background retry: the next
//! operation starts with the authoritative store again, and mirror-only edits
//! are never uploaded or combined with authoritative history.

use crate::error::{QueueError, Result};
use crate::metrics::MetricsCollector;
use crate::replica::caller::Caller;
use crate::store::QueueStore;
use crate::types::{
    CreateQueueRequest, JoinRequest, LeaveRequest, QueueDetail, QueueMeta, QueueView,
    DEFAULT_QUEUE_ID,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Advisory attached to every result served by the mirror
pub const MIRROR_ADVISORY: &str =
    "Working offline: the queue service is unreachable. Changes are saved on this device only.";

/// Which store served the last operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Online,
    Mirror,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Online => write!(f, "online"),
            SyncMode::Mirror => write!(f, "mirror"),
        }
    }
}

/// Result of an operation together with the mode that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synced<T> {
    pub value: T,
    pub mode: SyncMode,
    pub advisory: Option<String>,
}

impl<T> Synced<T> {
    fn online(value: T) -> Self {
        Self {
            value,
            mode: SyncMode::Online,
            advisory: None,
        }
    }

    fn mirror(value: T) -> Self {
        Self {
            value,
            mode: SyncMode::Mirror,
            advisory: Some(MIRROR_ADVISORY.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.mode == SyncMode::Mirror
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Transform the value, keeping mode and advisory
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        Synced {
            value: f(self.value),
            mode: self.mode,
            advisory: self.advisory,
        }
    }
}

/// Runs queue operations against an authoritative store with a mirror fallback
pub struct ReplicaSync<A, M> {
    authoritative: A,
    mirror: M,
    request_timeout: Duration,
    mode: Mutex<SyncMode>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<A, M> ReplicaSync<A, M>
where
    A: QueueStore,
    M: QueueStore,
{
    pub fn new(authoritative: A, mirror: M, request_timeout: Duration) -> Self {
        Self {
            authoritative,
            mirror,
            request_timeout,
            mode: Mutex::new(SyncMode::Online),
            metrics: None,
        }
    }

    /// Count mirror fallbacks in the given collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mode of the most recent successful operation
    pub fn mode(&self) -> SyncMode {
        self.mode
            .lock()
            .map(|mode| *mode)
            .unwrap_or(SyncMode::Online)
    }

    pub fn authoritative(&self) -> &A {
        &self.authoritative
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }

    pub async fn list(&self) -> Result<Synced<Vec<QueueMeta>>> {
        let online = self.attempt(self.authoritative.list()).await;
        self.reconcile("list", online, || self.mirror.list()).await
    }

    pub async fn create(&self, request: CreateQueueRequest) -> Result<Synced<QueueMeta>> {
        request.validate()?;
        let online = self.attempt(self.authoritative.create(request.clone())).await;
        self.reconcile("create", online, || self.mirror.create(request))
            .await
    }

    pub async fn detail(&self, queue_id: &str) -> Result<Synced<QueueDetail>> {
        let online = self.attempt(self.authoritative.detail(queue_id)).await;
        self.reconcile("detail", online, || self.mirror.detail(queue_id))
            .await
    }

    /// Queue list plus the detail of the queue being looked at
    pub async fn select(&self, queue_id: &str) -> Result<Synced<QueueView>> {
        let online = self.attempt(self.authoritative.select(queue_id)).await;
        self.reconcile("select", online, || self.mirror.select(queue_id))
            .await
    }

    pub async fn join(&self, queue_id: &str, request: JoinRequest) -> Result<Synced<usize>> {
        request.validate()?;
        let online = self
            .attempt(self.authoritative.join(queue_id, request.clone()))
            .await;
        self.reconcile("join", online, || self.mirror.join(queue_id, request))
            .await
    }

    pub async fn leave(&self, queue_id: &str, request: LeaveRequest) -> Result<Synced<()>> {
        request.validate()?;
        let online = self
            .attempt(self.authoritative.leave(queue_id, request.clone()))
            .await;
        self.reconcile("leave", online, || self.mirror.leave(queue_id, request))
            .await
    }

    pub async fn join_as(&self, caller: &Caller, queue_id: &str) -> Result<Synced<usize>> {
        self.join(queue_id, caller.join_request()).await
    }

    pub async fn leave_as(&self, caller: &Caller, queue_id: &str) -> Result<Synced<()>> {
        self.leave(queue_id, caller.leave_request()).await
    }

    /// Clear a queue; only privileged callers may do this
    pub async fn clear(&self, caller: &Caller, queue_id: &str) -> Result<Synced<()>> {
        require_privileged(caller, "clear queues")?;
        let online = self.attempt(self.authoritative.clear(queue_id)).await;
        self.reconcile("clear", online, || self.mirror.clear(queue_id))
            .await
    }

    /// Delete a queue; only privileged callers may do this
    pub async fn delete(&self, caller: &Caller, queue_id: &str) -> Result<Synced<()>> {
        require_privileged(caller, "delete queues")?;
        match queue_id.trim() {
            "" => return Err(QueueError::validation("queueId required")),
            DEFAULT_QUEUE_ID => {
                return Err(QueueError::InvalidOperation {
                    reason: "default queue cannot be deleted".to_string(),
                })
            }
            _ => {}
        }
        let online = self.attempt(self.authoritative.delete(queue_id)).await;
        self.reconcile("delete", online, || self.mirror.delete(queue_id))
            .await
    }

    /// One bounded attempt against the authoritative store
    async fn attempt<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::transport(format!(
                "no answer within {:?}",
                self.request_timeout
            ))),
        }
    }

    /// Accept the authoritative outcome, or replay on the mirror after a transport failure
    async fn reconcile<T, F, Fut>(
        &self,
        operation: &'static str,
        online: Result<T>,
        fallback: F,
    ) -> Result<Synced<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match online {
            Ok(value) => {
                debug!("{} served by {} store", operation, self.authoritative.backend());
                self.set_mode(SyncMode::Online);
                Ok(Synced::online(value))
            }
            Err(err) if err.is_transport() => {
                warn!(
                    "{} failed against {} store ({}), falling back to {} mirror",
                    operation,
                    self.authoritative.backend(),
                    err,
                    self.mirror.backend()
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_mirror_fallback(operation);
                }
                let value = fallback().await?;
                self.set_mode(SyncMode::Mirror);
                Ok(Synced::mirror(value))
            }
            Err(err) => Err(err),
        }
    }

    fn set_mode(&self, mode: SyncMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }
}

fn require_privileged(caller: &Caller, action: &str) -> Result<()> {
    if caller.privileged {
        Ok(())
    } else {
        Err(QueueError::Forbidden {
            reason: format!("only privileged callers may {}", action),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockQueueStore;

    fn mock(name: &'static str) -> MockQueueStore {
        let mut store = MockQueueStore::new();
        store.expect_backend().return_const(name);
        store
    }

    fn admin() -> Caller {
        Caller {
            member_id: "1".to_string(),
            display_name: None,
            handle: Some("admin".to_string()),
            privileged: true,
        }
    }

    fn sync(authoritative: MockQueueStore, mirror: MockQueueStore) -> ReplicaSync<MockQueueStore, MockQueueStore> {
        ReplicaSync::new(authoritative, mirror, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_online_success_does_not_touch_mirror() {
        let mut authoritative = mock("authoritative");
        authoritative.expect_join().times(1).returning(|_, _| Ok(3));
        let mut mirror = mock("mirror");
        mirror.expect_join().times(0);

        let replica = sync(authoritative, mirror);
        let result = replica.join("q1", JoinRequest::new("u1")).await.unwrap();

        assert_eq!(result.value, 3);
        assert!(!result.is_degraded());
        assert!(result.advisory.is_none());
        assert_eq!(replica.mode(), SyncMode::Online);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_mirror() {
        let mut authoritative = mock("authoritative");
        authoritative
            .expect_join()
            .times(1)
            .returning(|_, _| Err(QueueError::transport("connection refused")));
        let mut mirror = mock("mirror");
        mirror
            .expect_join()
            .withf(|queue_id, request| {
                queue_id.to_string() == "q1" && request.member_id.as_deref() == Some("u1")
            })
            .times(1)
            .returning(|_, _| Ok(1));

        let replica = sync(authoritative, mirror);
        let result = replica.join("q1", JoinRequest::new("u1")).await.unwrap();

        assert_eq!(result.value, 1);
        assert!(result.is_degraded());
        assert_eq!(result.advisory.as_deref(), Some(MIRROR_ADVISORY));
        assert_eq!(replica.mode(), SyncMode::Mirror);
    }

    #[tokio::test]
    async fn test_rejections_from_authoritative_are_not_replayed() {
        let mut authoritative = mock("authoritative");
        authoritative.expect_delete().times(1).returning(|id| {
            Err(QueueError::NotFound {
                queue_id: id.to_string(),
            })
        });
        let mut mirror = mock("mirror");
        mirror.expect_delete().times(0);

        let replica = sync(authoritative, mirror);
        let err = replica.delete(&admin(), "ghost").await.unwrap_err();
        assert!(matches!(err, QueueError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_requests_never_reach_a_store() {
        let mut authoritative = mock("authoritative");
        authoritative.expect_join().times(0);
        authoritative.expect_create().times(0);
        authoritative.expect_delete().times(0);
        let mut mirror = mock("mirror");
        mirror.expect_join().times(0);
        mirror.expect_create().times(0);
        mirror.expect_delete().times(0);

        let replica = sync(authoritative, mirror);
        assert!(matches!(
            replica.join("q1", JoinRequest::default()).await,
            Err(QueueError::Validation { .. })
        ));
        assert!(matches!(
            replica.create(CreateQueueRequest::new("  ")).await,
            Err(QueueError::Validation { .. })
        ));
        assert!(matches!(
            replica.delete(&admin(), DEFAULT_QUEUE_ID).await,
            Err(QueueError::InvalidOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_unprivileged_caller_cannot_clear() {
        let mut authoritative = mock("authoritative");
        authoritative.expect_clear().times(0);
        let mut mirror = mock("mirror");
        mirror.expect_clear().times(0);

        let replica = sync(authoritative, mirror);
        let guest = Caller {
            privileged: false,
            ..admin()
        };
        assert!(matches!(
            replica.clear(&guest, "q1").await,
            Err(QueueError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_each_operation_retries_authoritative_first() {
        let mut authoritative = mock("authoritative");
        let mut calls = 0;
        authoritative.expect_clear().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(QueueError::transport("timeout"))
            } else {
                Ok(())
            }
        });
        let mut mirror = mock("mirror");
        mirror.expect_clear().times(1).returning(|_| Ok(()));

        let replica = sync(authoritative, mirror);
        assert!(replica.clear(&admin(), "q1").await.unwrap().is_degraded());
        assert_eq!(replica.mode(), SyncMode::Mirror);
        assert!(!replica.clear(&admin(), "q1").await.unwrap().is_degraded());
        assert_eq!(replica.mode(), SyncMode::Online);
    }

    #[tokio::test]
    async fn test_mirror_failure_is_reported() {
        let mut authoritative = mock("authoritative");
        authoritative
            .expect_list()
            .returning(|| Err(QueueError::transport("down")));
        let mut mirror = mock("mirror");
        mirror
            .expect_list()
            .returning(|| Err(QueueError::storage("read-only filesystem")));

        let replica = sync(authoritative, mirror);
        assert!(matches!(
            replica.list().await,
            Err(QueueError::Storage { .. })
        ));
        assert_eq!(replica.mode(), SyncMode::Online);
    }
}
