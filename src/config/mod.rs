//! Configuration management for the waitline service
//!
//! Loading from environment variables or a TOML file, validation and default
//! values.

pub mod app;

pub use app::{validate_config, AppConfig, EstimatorSettings, ReplicaSettings, ServiceSettings};
