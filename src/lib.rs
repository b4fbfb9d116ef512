//! Waitline - virtual waiting lines with wait-time estimation
//!
//! This crate provides a multi-queue registry with FIFO membership, a rolling
//! window estimator of service durations, and a replica layer that falls back
//! to a locally persisted mirror when the authoritative store is unreachable.

pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod queue;
pub mod replica;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
pub mod wait_time;

// Re-export commonly used types and traits
pub use error::{QueueError, Result};
pub use types::*;

// Re-export key components
pub use queue::{QueueRegistry, QueueState};
pub use replica::{AccessPolicy, Caller, ReplicaSync, SyncMode, Synced};
pub use store::{InMemoryQueueStore, QueueStore, RemoteQueueStore, SnapshotQueueStore};
pub use wait_time::DurationEstimator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
