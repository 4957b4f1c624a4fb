//! Metrics definitions for the auth service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: 9 workflow operations (login, token, register, refresh, ...)
//! - `status`: 2 values (success, error)
//! - `error_category`: 3 values for workflows, 5 token failure labels for validation
//! - `kind`: access, refresh, reset, otp
//! - `store_op`: set_add, set_members, delete, ping

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Workflow durations are dominated by bcrypt, so buckets start at 10ms.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("auth_operation".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.350, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set operation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Workflow Metrics
// ============================================================================

/// Record workflow operation duration and outcome
///
/// Metric: `auth_operation_duration_seconds`, `auth_operations_total`
/// Labels: `operation`, `status`, `error_category`
pub fn record_auth_operation(
    operation: &'static str,
    status: &str,
    error_category: Option<&str>,
    duration: Duration,
) {
    histogram!("auth_operation_duration_seconds",
        "operation" => operation,
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("auth_operations_total",
        "operation" => operation,
        "status" => status.to_string(),
        "error_category" => error_category.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token validation result
///
/// Metric: `auth_token_validations_total`
/// Labels: `status`, `error_category`
pub fn record_token_validation(status: &str, error_category: Option<&str>) {
    let category = error_category.unwrap_or("none");
    counter!("auth_token_validations_total",
        "status" => status.to_string(),
        "error_category" => category.to_string()
    )
    .increment(1);
}

// ============================================================================
// Session Registry Metrics
// ============================================================================

/// Record a session set being revoked
///
/// Metric: `auth_session_revocations_total`
/// Labels: `kind`
pub fn record_session_revocation(kind: &str) {
    counter!("auth_session_revocations_total", "kind" => kind.to_string()).increment(1);
}

/// Record a key-value store failure
///
/// Metric: `auth_store_errors_total`
/// Labels: `store_op`
pub fn record_store_error(store_op: &'static str) {
    counter!("auth_store_errors_total", "store_op" => store_op).increment(1);
}

// ============================================================================
// Notification Metrics
// ============================================================================

/// Record OTP delivery outcome
///
/// Metric: `auth_otp_deliveries_total`
/// Labels: `status`
///
/// Delivery failures do not fail the workflow, so this counter is the only
/// signal that codes are not reaching users.
pub fn record_otp_delivery(status: &str) {
    counter!("auth_otp_deliveries_total", "status" => status.to_string()).increment(1);
}
