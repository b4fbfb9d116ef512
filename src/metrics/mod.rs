//! Metrics for the waitline service
//!
//! Prometheus counters, gauges and histograms, rendered in the text format by
//! the HTTP binding.

pub mod collector;

pub use collector::{
    MetricsCollector, MetricsTimer, OperationMetrics, PerformanceMetrics, QueueMetrics,
};
