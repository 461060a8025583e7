//! Observability infrastructure for capacity estimation
//!
//! Provides:
//! - Prometheus metrics (finalize runs, fallbacks, latency, namespaces processed)
//! - Structured JSON logging with tracing

use crate::finalize::FallbackReason;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CapacityMetricsInner> = OnceLock::new();

struct CapacityMetricsInner {
    finalize_runs: IntCounterVec,
    fallbacks: IntCounterVec,
    finalize_latency_seconds: Histogram,
    namespaces_processed: IntCounter,
    approver_lookups: IntCounter,
}

impl CapacityMetricsInner {
    fn new() -> Self {
        Self {
            finalize_runs: register_int_counter_vec!(
                "capacity_finalize_runs_total",
                "Finalize runs by the source of the accepted summary",
                &["source"]
            )
            .expect("Failed to register finalize_runs_total"),

            fallbacks: register_int_counter_vec!(
                "capacity_fallbacks_total",
                "Finalize runs that fell back to the local summary",
                &["reason"]
            )
            .expect("Failed to register fallbacks_total"),

            finalize_latency_seconds: register_histogram!(
                "capacity_finalize_latency_seconds",
                "Time spent computing a finalized cost breakdown",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register finalize_latency_seconds"),

            namespaces_processed: register_int_counter!(
                "capacity_namespaces_processed_total",
                "Namespaces included in finalized breakdowns"
            )
            .expect("Failed to register namespaces_processed_total"),

            approver_lookups: register_int_counter!(
                "capacity_approver_lookups_total",
                "Approver lookups served"
            )
            .expect("Failed to register approver_lookups_total"),
        }
    }
}

/// Handle to the global capacity metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct CapacityMetrics {
    _private: (),
}

impl Default for CapacityMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CapacityMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CapacityMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CapacityMetricsInner {
        GLOBAL_METRICS.get_or_init(CapacityMetricsInner::new)
    }

    /// Record a finalize run and the path that produced its summary
    pub fn inc_finalize_runs(&self, source: &str) {
        self.inner().finalize_runs.with_label_values(&[source]).inc();
    }

    pub fn inc_fallbacks(&self, reason: &FallbackReason) {
        self.inner()
            .fallbacks
            .with_label_values(&[reason.label()])
            .inc();
    }

    pub fn observe_finalize_latency(&self, duration_secs: f64) {
        self.inner().finalize_latency_seconds.observe(duration_secs);
    }

    pub fn add_namespaces_processed(&self, count: u64) {
        self.inner().namespaces_processed.inc_by(count);
    }

    pub fn inc_approver_lookups(&self) {
        self.inner().approver_lookups.inc();
    }
}

/// Structured logger for estimation events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log an accepted finalize summary
    pub fn log_finalize_accepted(&self, source: &str, environments: usize, raw_total_monthly: f64) {
        info!(
            event = "finalize_accepted",
            instance = %self.instance,
            source = %source,
            environments = environments,
            raw_total_monthly = raw_total_monthly,
            "Finalized cost summary accepted"
        );
    }

    /// Log a fallback to the locally computed summary
    pub fn log_finalize_fallback(&self, reason: &FallbackReason, namespaces: usize) {
        warn!(
            event = "finalize_fallback",
            instance = %self.instance,
            reason = %reason.label(),
            details = %reason,
            namespaces = namespaces,
            "Cost service result not usable, using local calculation"
        );
    }

    /// Log a finalize breakdown computed by the service
    pub fn log_breakdown_computed(
        &self,
        environments: usize,
        namespaces: usize,
        raw_total_monthly: f64,
    ) {
        info!(
            event = "breakdown_computed",
            instance = %self.instance,
            environments = environments,
            namespaces = namespaces,
            raw_total_monthly = raw_total_monthly,
            "Computed finalized cost breakdown"
        );
    }

    /// Log the organization directory source
    pub fn log_directory_loaded(&self, source: &str, entries: usize) {
        info!(
            event = "org_directory_loaded",
            instance = %self.instance,
            source = %source,
            entries = entries,
            "Organization directory loaded"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, environment: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            environment = %environment,
            "Cost service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Cost service shutting down"
        );
    }
}
