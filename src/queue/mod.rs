//! Queue state and registry
//!
//! A queue is an ordered membership list plus its own duration estimator;
//! the registry owns every queue and keeps the reserved `default` queue alive.

pub mod registry;
pub mod state;

// Re-export commonly used types
pub use registry::QueueRegistry;
pub use state::QueueState;
