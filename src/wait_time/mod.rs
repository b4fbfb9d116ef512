//! Wait time estimation
//!
//! This module turns observed service durations into a wait-per-person figure
//! and derives per-member ETAs from it.

pub mod calculator;
pub mod estimator;

// Re-export commonly used types
pub use calculator::{estimated_wait_minutes, format_wait};
pub use estimator::DurationEstimator;
