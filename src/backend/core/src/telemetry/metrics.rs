//! Prometheus metrics for the task engines and error rates.
//!
//! This module provides metrics collection for:
//!
//! - Task lifecycle counters/histograms (C5/C6: submitted, completed, failed,
//!   duration)
//! - Queue depth and async worker utilization gauges (C6)
//! - Error counters by type/code for observability
//!
//! # Example
//!
//! ```rust,no_run
//! use flowplug_core::telemetry::metrics::{MetricsRegistry, TaskMetrics, ErrorCounter};
//!
//! TaskMetrics::record_completed("splitter", "split", 0.125);
//! ErrorCounter::increment("validation", "invalid_input");
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;

/// Global metrics registry.
static METRICS_REGISTRY: OnceLock<MetricsRegistry> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Prometheus exporter endpoint (e.g., "0.0.0.0:9090")
    #[serde(default = "default_metrics_endpoint")]
    pub endpoint: String,

    /// Histogram buckets for task durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            endpoint: default_metrics_endpoint(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_endpoint() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
}

/// Central metrics registry for managing all metrics.
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// Get the global metrics registry.
    pub fn global() -> &'static MetricsRegistry {
        METRICS_REGISTRY.get_or_init(|| MetricsRegistry {
            prometheus_handle: None,
        })
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle.as_ref().map(|h| h.render()).unwrap_or_default()
    }
}

/// Initialize the metrics subsystem.
///
/// # Errors
///
/// Returns an error if metrics initialization fails.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry {
            prometheus_handle: None,
        });
    }

    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;
    let handle = builder.install_recorder()?;

    register_metric_descriptions();

    let registry = MetricsRegistry {
        prometheus_handle: Some(handle),
    };
    let _ = METRICS_REGISTRY.set(MetricsRegistry {
        prometheus_handle: None,
    });

    tracing::info!(service_name = %service_name, endpoint = %config.endpoint, "metrics initialized");

    Ok(registry)
}

/// Register all metric descriptions.
fn register_metric_descriptions() {
    describe_counter!("errors_total", "Total number of errors by type");

    describe_counter!("flowplug_tasks_submitted_total", "Total number of tasks submitted to the sync engine (C5)");
    describe_counter!("flowplug_tasks_completed_total", "Total number of tasks completed successfully (C5/C6)");
    describe_counter!("flowplug_tasks_failed_total", "Total number of tasks that errored (C5/C6)");
    describe_histogram!("flowplug_task_duration_seconds", "Task execution duration in seconds (C5/C6)");

    describe_gauge!("flowplug_queue_depth", "Number of task/job ids currently queued (C5/C6)");
    describe_gauge!("flowplug_worker_utilization", "Async worker pool utilization, 0.0-1.0 (C6)");

    describe_counter!("flowplug_hook_pipeline_failures_total", "Hook handle failures caught during pipeline execution (C4)");
}

/// Error counter for tracking errors by type.
pub struct ErrorCounter;

impl ErrorCounter {
    /// Increment the error counter for a specific error type.
    pub fn increment(error_type: &str, error_code: &str) {
        counter!(
            "errors_total",
            "type" => error_type.to_string(),
            "code" => error_code.to_string(),
        )
        .increment(1);
    }
}

/// Task-lifecycle metrics (C5 sync engine and C6 async worker share this
/// vocabulary — neither component distinguishes itself in the metric name,
/// only via the `hook`/`plugin_id` labels).
pub struct TaskMetrics;

impl TaskMetrics {
    pub fn record_submitted(plugin_id: &str, hook: &str) {
        counter!(
            "flowplug_tasks_submitted_total",
            "plugin_id" => plugin_id.to_string(),
            "hook" => hook.to_string(),
        )
        .increment(1);
    }

    pub fn record_completed(plugin_id: &str, hook: &str, duration_seconds: f64) {
        counter!(
            "flowplug_tasks_completed_total",
            "plugin_id" => plugin_id.to_string(),
            "hook" => hook.to_string(),
        )
        .increment(1);
        histogram!(
            "flowplug_task_duration_seconds",
            "plugin_id" => plugin_id.to_string(),
            "hook" => hook.to_string(),
        )
        .record(duration_seconds);
    }

    pub fn record_failed(plugin_id: &str, hook: &str) {
        counter!(
            "flowplug_tasks_failed_total",
            "plugin_id" => plugin_id.to_string(),
            "hook" => hook.to_string(),
        )
        .increment(1);
    }

    pub fn set_queue_depth(depth: u64) {
        gauge!("flowplug_queue_depth").set(depth as f64);
    }

    pub fn set_worker_utilization(utilization: f64) {
        gauge!("flowplug_worker_utilization").set(utilization);
    }

    /// Record a hook handle failure caught and isolated by the dispatcher (C4).
    pub fn record_hook_pipeline_failure(hook: &str, plugin_id: &str) {
        counter!(
            "flowplug_hook_pipeline_failures_total",
            "hook" => hook.to_string(),
            "plugin_id" => plugin_id.to_string(),
        )
        .increment(1);
    }
}

/// Utility for tracking operation timing with automatic metric recording.
pub struct OperationTimer {
    start: Instant,
    operation_name: &'static str,
    labels: HashMap<String, String>,
}

impl OperationTimer {
    /// Start timing an operation.
    ///
    /// Note: the operation_name must be a static string since metrics names
    /// cannot be dynamically generated at runtime.
    pub fn start(operation_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation_name,
            labels: HashMap::new(),
        }
    }

    /// Add a label to the timer.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Get elapsed time without recording.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// Finish and record to a generic "operation_duration_seconds" histogram
    /// with the operation name as a label.
    pub fn finish(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        histogram!(
            "operation_duration_seconds",
            "operation" => self.operation_name,
        )
        .record(duration.as_secs_f64());
        duration
    }
}
