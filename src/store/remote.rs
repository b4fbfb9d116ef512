//! HTTP client for the authoritative queue service
//!
//! Each call is a single request with a timeout and no retries. Anything that
//! prevents a well-formed answer (connection failure, timeout, 5xx, a body the
//! client cannot decode) is reported as a transport error; well-formed
//! rejections are decoded back into their typed error.

use crate::error::{QueueError, Result};
use crate::store::QueueStore;
use crate::types::{
    Ack, CreateQueueRequest, CreateQueueResponse, ErrorBody, JoinRequest, JoinResponse,
    LeaveRequest, QueueDetail, QueueListResponse, QueueMeta,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Queue store that talks to the reference HTTP binding
#[derive(Debug, Clone)]
pub struct RemoteQueueStore {
    client: Client,
    base: Url,
}

impl RemoteQueueStore {
    /// Create a client for the service at `api_base` (e.g. `http://127.0.0.1:3000`)
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(api_base).map_err(|e| {
            QueueError::validation(format!("Invalid API base '{}': {}", api_base, e))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `<base>/api/queues[/<queue_id>[/<action>]]` with the id percent-encoded
    fn queues_url(&self, queue_id: Option<&str>, action: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                QueueError::validation(format!("API base '{}' cannot hold a path", self.base))
            })?;
            segments.pop_if_empty().extend(["api", "queues"]);
            if let Some(queue_id) = queue_id {
                segments.push(queue_id);
            }
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| QueueError::transport(format!("Request failed: {}", e)))?;
        let status = response.status();
        debug!("Authoritative store answered {} for {}", status, response.url());

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| QueueError::transport(format!("Undecodable response: {}", e)));
        }

        if status.is_client_error() {
            if let Ok(body) = response.json::<ErrorBody>().await {
                if let Some(err) = body
                    .kind
                    .as_deref()
                    .and_then(|kind| QueueError::from_kind(kind, body.error.clone()))
                {
                    return Err(err);
                }
            }
        }

        Err(QueueError::transport(format!("HTTP {}", status)))
    }
}

#[async_trait]
impl QueueStore for RemoteQueueStore {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn list(&self) -> Result<Vec<QueueMeta>> {
        let url = self.queues_url(None, None)?;
        let body: QueueListResponse = self.send(self.client.get(url)).await?;
        Ok(body.queues)
    }

    async fn create(&self, request: CreateQueueRequest) -> Result<QueueMeta> {
        let url = self.queues_url(None, None)?;
        let body: CreateQueueResponse = self.send(self.client.post(url).json(&request)).await?;
        Ok(body.queue)
    }

    async fn detail(&self, queue_id: &str) -> Result<QueueDetail> {
        let url = self.queues_url(Some(queue_id), None)?;
        self.send(self.client.get(url)).await
    }

    async fn join(&self, queue_id: &str, request: JoinRequest) -> Result<usize> {
        let url = self.queues_url(Some(queue_id), Some("join"))?;
        let body: JoinResponse = self.send(self.client.post(url).json(&request)).await?;
        Ok(body.position)
    }

    async fn leave(&self, queue_id: &str, request: LeaveRequest) -> Result<()> {
        let url = self.queues_url(Some(queue_id), Some("leave"))?;
        let _: Ack = self.send(self.client.post(url).json(&request)).await?;
        Ok(())
    }

    async fn clear(&self, queue_id: &str) -> Result<()> {
        let url = self.queues_url(Some(queue_id), Some("clear"))?;
        let _: Ack = self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn delete(&self, queue_id: &str) -> Result<()> {
        let url = self.queues_url(Some(queue_id), None)?;
        let _: Ack = self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> RemoteQueueStore {
        RemoteQueueStore::new(base, Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn test_urls_are_built_from_base() {
        let store = store("http://127.0.0.1:3000");
        assert_eq!(
            store.queues_url(None, None).unwrap().as_str(),
            "http://127.0.0.1:3000/api/queues"
        );
        assert_eq!(
            store.queues_url(Some("front desk"), Some("join")).unwrap().as_str(),
            "http://127.0.0.1:3000/api/queues/front%20desk/join"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let store = store("http://example.com/queue-app/");
        assert_eq!(
            store.queues_url(Some("q1"), None).unwrap().as_str(),
            "http://example.com/queue-app/api/queues/q1"
        );
    }

    #[test]
    fn test_invalid_base_is_rejected() {
        assert!(RemoteQueueStore::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Port 9 (discard) is not expected to run an HTTP server locally.
        let store = store("http://127.0.0.1:9");
        let err = store.list().await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {:?}", err);
    }
}
