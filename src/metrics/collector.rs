//! Metrics collection using Prometheus
//!
//! Counters and gauges for queue operations, mirror fallbacks and the
//! per-queue state exposed on `/metrics`.

use crate::types::QueueMeta;
use anyhow::Result;
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the queue service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Request-level counters
    operation_metrics: OperationMetrics,

    /// Per-queue state
    queue_metrics: QueueMetrics,

    /// Timing histograms
    performance_metrics: PerformanceMetrics,
}

/// Request-level counters
#[derive(Clone)]
pub struct OperationMetrics {
    /// Operations handled, by outcome (`ok` or the error kind)
    pub operations_total: IntCounterVec,

    /// Operations that were replayed on the local mirror
    pub mirror_fallbacks_total: IntCounterVec,
}

/// Per-queue state
#[derive(Clone)]
pub struct QueueMetrics {
    /// Members currently waiting
    pub queue_members: IntGaugeVec,

    /// Current wait-per-person estimate
    pub avg_service_minutes: GaugeVec,

    /// Number of queues in the registry
    pub queues_active: IntGauge,
}

/// Timing histograms
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Observed time between join and leave
    pub service_duration: Histogram,

    /// Handler latency
    pub operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let operation_metrics = OperationMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            operation_metrics,
            queue_metrics,
            performance_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn operations(&self) -> &OperationMetrics {
        &self.operation_metrics
    }

    pub fn queues(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a handled operation and how long it took
    pub fn record_operation(&self, operation: &str, outcome: &str, duration: Duration) {
        self.operation_metrics
            .operations_total
            .with_label_values(&[operation, outcome])
            .inc();

        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record an operation served by the mirror
    pub fn record_mirror_fallback(&self, operation: &str) {
        self.operation_metrics
            .mirror_fallbacks_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Record the join-to-leave time of a served member
    pub fn record_service_duration(&self, elapsed: Duration) {
        self.performance_metrics
            .service_duration
            .observe(elapsed.as_secs_f64());
    }

    /// Replace the per-queue gauges with the current queue list
    pub fn update_queue_gauges(&self, queues: &[QueueMeta]) {
        self.queue_metrics.queue_members.reset();
        self.queue_metrics.avg_service_minutes.reset();

        for queue in queues {
            self.queue_metrics
                .queue_members
                .with_label_values(&[queue.id.as_str()])
                .set(queue.size as i64);
            self.queue_metrics
                .avg_service_minutes
                .with_label_values(&[queue.id.as_str()])
                .set(queue.avg_service_minutes);
        }

        self.queue_metrics.queues_active.set(queues.len() as i64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl OperationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operations_total = IntCounterVec::new(
            Opts::new("waitline_operations_total", "Queue operations handled"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let mirror_fallbacks_total = IntCounterVec::new(
            Opts::new(
                "waitline_mirror_fallbacks_total",
                "Operations replayed on the local mirror",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(mirror_fallbacks_total.clone()))?;

        Ok(Self {
            operations_total,
            mirror_fallbacks_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_members = IntGaugeVec::new(
            Opts::new("waitline_queue_members", "Members currently waiting"),
            &["queue"],
        )?;
        registry.register(Box::new(queue_members.clone()))?;

        let avg_service_minutes = GaugeVec::new(
            Opts::new(
                "waitline_avg_service_minutes",
                "Estimated minutes of service per member",
            ),
            &["queue"],
        )?;
        registry.register(Box::new(avg_service_minutes.clone()))?;

        let queues_active = IntGauge::new("waitline_queues_active", "Queues in the registry")?;
        registry.register(Box::new(queues_active.clone()))?;

        Ok(Self {
            queue_members,
            avg_service_minutes,
            queues_active,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let service_duration = Histogram::with_opts(
            HistogramOpts::new(
                "waitline_service_duration_seconds",
                "Time between joining and leaving a queue",
            )
            .buckets(vec![
                30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0,
            ]),
        )?;
        registry.register(Box::new(service_duration.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "waitline_operation_duration_seconds",
                "Queue operation handling time",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            service_duration,
            operation_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(id: &str, size: usize, avg: f64) -> QueueMeta {
        QueueMeta {
            id: id.to_string(),
            name: id.to_string(),
            size,
            avg_service_minutes: avg,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_operation_counters() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_operation("join", "ok", Duration::from_millis(1));
        collector.record_operation("join", "ok", Duration::from_millis(2));
        collector.record_operation("join", "validation", Duration::from_millis(1));
        collector.record_mirror_fallback("leave");

        let ops = &collector.operations().operations_total;
        assert_eq!(ops.with_label_values(&["join", "ok"]).get(), 2);
        assert_eq!(ops.with_label_values(&["join", "validation"]).get(), 1);
        assert_eq!(
            collector
                .operations()
                .mirror_fallbacks_total
                .with_label_values(&["leave"])
                .get(),
            1
        );
    }

    #[test]
    fn test_queue_gauges_follow_latest_list() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_queue_gauges(&[meta("default", 3, 2.5), meta("lab", 1, 5.0)]);
        assert_eq!(collector.queues().queues_active.get(), 2);
        assert_eq!(
            collector
                .queues()
                .queue_members
                .with_label_values(&["default"])
                .get(),
            3
        );

        collector.update_queue_gauges(&[meta("default", 0, 5.0)]);
        assert_eq!(collector.queues().queues_active.get(), 1);
        let text = collector.encode_text().unwrap();
        assert!(!text.contains("queue=\"lab\""));
    }

    #[test]
    fn test_encode_text_contains_metric_names() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.record_operation("list", "ok", Duration::from_millis(1));
        collector.record_service_duration(Duration::from_secs(90));

        let text = collector.encode_text().unwrap();
        assert!(text.contains("waitline_operations_total"));
        assert!(text.contains("waitline_service_duration_seconds"));
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
