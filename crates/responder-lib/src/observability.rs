//! Observability infrastructure for the responder
//!
//! Provides:
//! - Prometheus metrics (alerts received, remediation outcomes, delete latency, build info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::{PayloadError, RemediationError};
use crate::models::{Alert, RemediationTarget};

/// Histogram buckets for delete round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Outcome label for a successful deletion
pub const OUTCOME_DELETED: &str = "deleted";
/// Outcome label for a payload rejected before dispatch
pub const OUTCOME_REJECTED: &str = "rejected";

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ResponderMetricsInner> = OnceLock::new();

struct ResponderMetricsInner {
    alerts_received: IntCounter,
    remediations: IntCounterVec,
    remediation_latency_seconds: Histogram,
    build_info: GaugeVec,
}

impl ResponderMetricsInner {
    fn new() -> Self {
        Self {
            alerts_received: register_int_counter!(
                "pod_responder_alerts_received_total",
                "Total number of alert payloads received"
            )
            .expect("Failed to register alerts_received"),

            remediations: register_int_counter_vec!(
                "pod_responder_remediations_total",
                "Remediation attempts by outcome",
                &["outcome"]
            )
            .expect("Failed to register remediations"),

            remediation_latency_seconds: register_histogram!(
                "pod_responder_remediation_latency_seconds",
                "Time spent waiting for the API server to answer a pod deletion",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register remediation_latency_seconds"),

            build_info: register_gauge_vec!(
                "pod_responder_build_info",
                "Responder version and credential source",
                &["version", "credential_source"]
            )
            .expect("Failed to register build_info"),
        }
    }
}

/// Responder metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ResponderMetrics {
    _private: (),
}

impl Default for ResponderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponderMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ResponderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ResponderMetricsInner {
        GLOBAL_METRICS.get_or_init(ResponderMetricsInner::new)
    }

    pub fn inc_alerts_received(&self) {
        self.inner().alerts_received.inc();
    }

    /// Count one remediation outcome
    pub fn inc_outcome(&self, outcome: &str) {
        self.inner().remediations.with_label_values(&[outcome]).inc();
    }

    pub fn observe_remediation_latency(&self, duration_secs: f64) {
        self.inner().remediation_latency_seconds.observe(duration_secs);
    }

    pub fn set_build_info(&self, version: &str, credential_source: &str) {
        self.inner().build_info.reset();
        self.inner()
            .build_info
            .with_label_values(&[version, credential_source])
            .set(1.0);
    }
}

/// Structured logger for responder events
///
/// Every remediation decision is logged with the alert's audit fields so
/// the log stream alone reconstructs what was deleted and why.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, credential_source: &str) {
        info!(
            event = "responder_started",
            instance = %self.instance,
            version = %version,
            credential_source = %credential_source,
            "Pod responder starting"
        );
    }

    pub fn log_credential_resolved(&self, origin: &str) {
        info!(
            event = "credential_resolved",
            instance = %self.instance,
            origin = %origin,
            "Cluster credentials ready"
        );
    }

    pub fn log_remediation(&self, alert: &Alert, target: &RemediationTarget, elapsed_ms: u128) {
        warn!(
            event = "remediation_succeeded",
            instance = %self.instance,
            namespace = %target.namespace,
            pod_name = %target.pod_name,
            rule = alert.rule.as_deref().unwrap_or_default(),
            priority = alert.priority.as_deref().unwrap_or_default(),
            container_id = alert.container_id().unwrap_or_default(),
            proc_cmdline = alert.proc_cmdline().unwrap_or_default(),
            elapsed_ms = elapsed_ms as u64,
            "Deleted pod named by alert"
        );
    }

    pub fn log_remediation_failure(
        &self,
        alert: &Alert,
        target: &RemediationTarget,
        error: &RemediationError,
    ) {
        warn!(
            event = "remediation_failed",
            instance = %self.instance,
            namespace = %target.namespace,
            pod_name = %target.pod_name,
            rule = alert.rule.as_deref().unwrap_or_default(),
            priority = alert.priority.as_deref().unwrap_or_default(),
            failure = error.label(),
            reason = %error,
            "Failed to delete pod named by alert"
        );
    }

    pub fn log_rejection(&self, error: &PayloadError) {
        info!(
            event = "alert_rejected",
            instance = %self.instance,
            reason = %error,
            "Rejected alert payload"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "responder_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Pod responder shutting down"
        );
    }
}
