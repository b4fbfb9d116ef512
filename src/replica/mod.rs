//! Dual-mode reconciliation
//!
//! Operations go to the authoritative store first and fall back to the local
//! mirror when it cannot be reached. The two histories are never merged.

pub mod caller;
pub mod sync;

// Re-export commonly used types
pub use caller::{AccessPolicy, Caller};
pub use sync::{ReplicaSync, SyncMode, Synced, MIRROR_ADVISORY};
