//! Application state and HTTP server lifecycle
//!
//! `AppState` owns the authoritative queue store and the metrics collector;
//! `HttpServer` runs the reference binding until asked to stop.

use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::service::routes::router;
use crate::store::InMemoryQueueStore;
use crate::utils::{Clock, SystemClock};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Shared state of the reference HTTP binding
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Authoritative queue registry
    store: Arc<InMemoryQueueStore>,

    /// Prometheus metrics
    metrics: Arc<MetricsCollector>,

    started_at: DateTime<Utc>,

    /// Whether the HTTP server is accepting requests
    is_running: AtomicBool,
}

impl AppState {
    /// Build the state with the wall clock
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the state with a custom clock driving the queue store
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let started_at = clock.now();
        let store = InMemoryQueueStore::with_clock(config.estimator.sample_capacity, clock)
            .with_metrics(metrics.clone());

        info!(
            "Initialized {} with sample capacity {}",
            config.service.name, config.estimator.sample_capacity
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            metrics,
            started_at,
            is_running: AtomicBool::new(false),
        })
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<InMemoryQueueStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Check if the server is accepting requests
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.is_running.store(running, Ordering::SeqCst);
    }
}

/// Reference HTTP binding with graceful shutdown
pub struct HttpServer {
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { state, shutdown_tx }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Bind the configured address
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr = self.state.config().bind_address();
        TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))
    }

    /// Serve on `listener` in a background task until `stop` is called
    pub fn spawn(&self, listener: TcpListener) -> JoinHandle<anyhow::Result<()>> {
        let app = router(self.state.clone());
        let state = self.state.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let addr = listener.local_addr()?;
            info!("Queue service listening on http://{}", addr);
            state.set_running(true);

            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("HTTP server shutdown signal received");
                })
                .await;

            state.set_running(false);
            info!("HTTP server stopped");
            result.context("HTTP server failed")
        })
    }

    /// Ask the server to stop accepting connections
    pub fn stop(&self) {
        info!("Stopping HTTP server...");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to HTTP server: {}", e);
        }
    }
}
