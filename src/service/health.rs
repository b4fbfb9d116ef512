//! Health checks for the reference HTTP binding

use crate::service::app::AppState;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Registry statistics reported with every health check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub queues: usize,
    pub members_waiting: usize,
    pub uptime_seconds: i64,
}

impl HealthCheck {
    /// Check that the server runs and the registry lock is usable.
    ///
    /// A usable registry behind a stopped listener is degraded; an unusable
    /// registry is unhealthy.
    pub fn check(app_state: &AppState) -> Self {
        let mut checks = Vec::new();

        checks.push(if app_state.is_running() {
            ComponentCheck::healthy("service_running")
        } else {
            ComponentCheck::degraded("service_running", "Service is not accepting requests")
        });

        let store = app_state.store();
        let stats = match (store.queue_count(), store.members_waiting()) {
            (Ok(queues), Ok(members_waiting)) => {
                checks.push(ComponentCheck::healthy("queue_registry"));
                ServiceStats {
                    queues,
                    members_waiting,
                    uptime_seconds: (chrono::Utc::now() - app_state.started_at()).num_seconds(),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("Queue registry check failed: {}", e);
                checks.push(ComponentCheck::unhealthy("queue_registry", e.to_string()));
                ServiceStats::default()
            }
        };

        let status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        }
    }
}

impl ComponentCheck {
    fn healthy(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    fn degraded(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    fn unhealthy(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}
