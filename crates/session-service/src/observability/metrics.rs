//! Metrics definitions for the session service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `session_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: success, error
//! - `outcome`: success, expired, invalid, error (plus revoked, absent, ignored for revocation)
//! - `operation`: insert, consume, revoke, ping, connect
//! - `endpoint`: the fixed route table, everything else is `/other`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("session_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("session_store_operation".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set store operation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("session_token_issuance".to_string()),
            &[0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Metric: `session_token_issuance_duration_seconds`, `session_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("session_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("session_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Metric: `session_access_verifications_total`
/// Labels: `outcome`
pub fn record_access_verification(outcome: &str) {
    counter!("session_access_verifications_total", "outcome" => outcome.to_string())
        .increment(1);
}

/// Metric: `session_token_rotations_total`
/// Labels: `outcome`
///
/// A sustained rise in `invalid` points at refresh token replay.
pub fn record_token_rotation(outcome: &str) {
    counter!("session_token_rotations_total", "outcome" => outcome.to_string()).increment(1);
}

/// Metric: `session_renewal_revocations_total`
/// Labels: `outcome`
pub fn record_renewal_revocation(outcome: &str) {
    counter!("session_renewal_revocations_total", "outcome" => outcome.to_string())
        .increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Metric: `session_store_operation_duration_seconds`, `session_store_operations_total`
/// Labels: `operation`, `status`
pub fn record_store_operation(operation: &str, status: &str, duration: Duration) {
    histogram!("session_store_operation_duration_seconds",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("session_store_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Identity Metrics
// ============================================================================

/// Metric: `session_logins_total`
/// Labels: `status`
pub fn record_login(status: &str) {
    counter!("session_logins_total", "status" => status.to_string()).increment(1);
}

/// Metric: `session_registrations_total`
/// Labels: `status`
pub fn record_registration(status: &str) {
    counter!("session_registrations_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `session_http_requests_total`, `session_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code`
///
/// Captures framework-level rejections (400, 404, 405, 415) as well.
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(path);

    histogram!("session_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => categorize_status_code(status_code)
    )
    .record(duration.as_secs_f64());

    counter!("session_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/me" => "/me",
        "/auth/register" => "/auth/register",
        "/auth/login" => "/auth/login",
        "/auth/refresh" => "/auth/refresh",
        "/auth/logout" => "/auth/logout",
        _ => "/other",
    }
}
