//! Service layer for the waitline queue service
//!
//! Application state, the axum reference binding of the queue operations,
//! health checks and the HTTP server lifecycle.

pub mod app;
pub mod health;
pub mod routes;

pub use app::{AppState, HttpServer, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use routes::{router, ApiError};
