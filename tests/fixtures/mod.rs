//! Test fixtures: stores with controllable failures and a live server helper

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use waitline::config::AppConfig;
use waitline::error::{QueueError, Result};
use waitline::service::{AppState, HttpServer};
use waitline::store::{InMemoryQueueStore, QueueStore};
use waitline::types::{
    CreateQueueRequest, JoinRequest, LeaveRequest, QueueDetail, QueueMeta,
};
use waitline::utils::{Clock, ManualClock};

/// Authoritative store that is never reachable
#[derive(Debug, Default)]
pub struct UnreachableStore {
    calls: AtomicUsize,
}

impl UnreachableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts made against this store
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::transport("connection refused"))
    }
}

#[async_trait]
impl QueueStore for UnreachableStore {
    fn backend(&self) -> &'static str {
        "unreachable"
    }

    async fn list(&self) -> Result<Vec<QueueMeta>> {
        self.fail()
    }

    async fn create(&self, _request: CreateQueueRequest) -> Result<QueueMeta> {
        self.fail()
    }

    async fn detail(&self, _queue_id: &str) -> Result<QueueDetail> {
        self.fail()
    }

    async fn join(&self, _queue_id: &str, _request: JoinRequest) -> Result<usize> {
        self.fail()
    }

    async fn leave(&self, _queue_id: &str, _request: LeaveRequest) -> Result<()> {
        self.fail()
    }

    async fn clear(&self, _queue_id: &str) -> Result<()> {
        self.fail()
    }

    async fn delete(&self, _queue_id: &str) -> Result<()> {
        self.fail()
    }
}

/// In-memory authoritative store whose connectivity can be switched off
pub struct FlakyStore {
    inner: InMemoryQueueStore,
    online: AtomicBool,
}

impl FlakyStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryQueueStore::with_clock(100, clock),
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryQueueStore {
        &self.inner
    }

    fn check(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::transport("network unreachable"))
        }
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn list(&self) -> Result<Vec<QueueMeta>> {
        self.check()?;
        self.inner.list().await
    }

    async fn create(&self, request: CreateQueueRequest) -> Result<QueueMeta> {
        self.check()?;
        self.inner.create(request).await
    }

    async fn detail(&self, queue_id: &str) -> Result<QueueDetail> {
        self.check()?;
        self.inner.detail(queue_id).await
    }

    async fn join(&self, queue_id: &str, request: JoinRequest) -> Result<usize> {
        self.check()?;
        self.inner.join(queue_id, request).await
    }

    async fn leave(&self, queue_id: &str, request: LeaveRequest) -> Result<()> {
        self.check()?;
        self.inner.leave(queue_id, request).await
    }

    async fn clear(&self, queue_id: &str) -> Result<()> {
        self.check()?;
        self.inner.clear(queue_id).await
    }

    async fn delete(&self, queue_id: &str) -> Result<()> {
        self.check()?;
        self.inner.delete(queue_id).await
    }
}

/// Store that never answers within any reasonable timeout
#[derive(Debug, Default)]
pub struct StallingStore;

impl StallingStore {
    async fn stall<T>(&self) -> Result<T> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(QueueError::internal("stalled store woke up"))
    }
}

#[async_trait]
impl QueueStore for StallingStore {
    fn backend(&self) -> &'static str {
        "stalling"
    }

    async fn list(&self) -> Result<Vec<QueueMeta>> {
        self.stall().await
    }

    async fn create(&self, _request: CreateQueueRequest) -> Result<QueueMeta> {
        self.stall().await
    }

    async fn detail(&self, _queue_id: &str) -> Result<QueueDetail> {
        self.stall().await
    }

    async fn join(&self, _queue_id: &str, _request: JoinRequest) -> Result<usize> {
        self.stall().await
    }

    async fn leave(&self, _queue_id: &str, _request: LeaveRequest) -> Result<()> {
        self.stall().await
    }

    async fn clear(&self, _queue_id: &str) -> Result<()> {
        self.stall().await
    }

    async fn delete(&self, _queue_id: &str) -> Result<()> {
        self.stall().await
    }
}

/// Manual clock shared between a test and the stores under test
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::default())
}

/// Reference binding running on an ephemeral local port
pub struct TestServer {
    pub base_url: String,
    pub server: HttpServer,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_clock(manual_clock()).await
    }

    pub async fn start_with_clock(clock: Arc<dyn Clock>) -> Self {
        let state = Arc::new(AppState::with_clock(AppConfig::default(), clock).unwrap());
        let server = HttpServer::new(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = server.spawn(listener);
        Self {
            base_url,
            server,
            handle,
        }
    }

    pub async fn shutdown(self) {
        self.server.stop();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}
