//! Metrics definitions for the Signaling Controller
//!
//! All metrics follow Prometheus naming conventions:
//! - `sc_` prefix for Signaling Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `from`, `to`: 7 session statuses
//! - `operation`: bounded by coordinator and store operations (~20 values)
//! - `code`: bounded by `ScError::error_code` (~12 values)
//! - `status`: success, error (timeout for HTTP)
//! - `endpoint`: normalized HTTP paths (~16 values)
//!
//! Session and user identifiers are never used as labels.

use crate::models::SessionStatus;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Coordinator operation latency, includes the actor round trip and store write
        .set_buckets_for_metric(
            Matcher::Prefix("sc_operation".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500,
            ],
        )
        .map_err(|e| format!("Failed to set operation duration buckets: {e}"))?
        // Store latency buckets - internal service call (like DB queries)
        .set_buckets_for_metric(
            Matcher::Prefix("sc_store".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500,
            ],
        )
        .map_err(|e| format!("Failed to set store latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session Lifecycle Metrics
// ============================================================================

/// Record an applied status transition.
///
/// Metric: `sc_session_transitions_total`
/// Labels: `from`, `to`
///
/// Cardinality: 13 (valid edges of the call and room tables)
pub fn record_transition(from: SessionStatus, to: SessionStatus) {
    counter!("sc_session_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Set the number of live session actors on this instance.
///
/// Metric: `sc_sessions_live`
/// Labels: none
pub fn set_sessions_live(count: usize) {
    // usize to f64 conversion is safe for realistic session counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_sessions_live").set(count as f64);
}

/// Record a join refused because the room was at capacity.
///
/// Metric: `sc_room_full_total`
/// Labels: none
pub fn record_room_full() {
    counter!("sc_room_full_total").increment(1);
}

// ============================================================================
// Coordinator Metrics
// ============================================================================

/// Record coordinator operation duration.
///
/// Metric: `sc_operation_duration_seconds`
/// Labels: `operation`, `status`
///
/// Cardinality: ~13 operations x 2 statuses
pub fn record_operation(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("sc_operation_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());
}

/// Record error by category.
///
/// Metric: `sc_errors_total`
/// Labels: `operation`, `code`
pub fn record_error(operation: &'static str, code: &'static str) {
    counter!("sc_errors_total",
        "operation" => operation,
        "code" => code
    )
    .increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Record session store operation latency.
///
/// Metric: `sc_store_latency_seconds`
/// Labels: `operation`
///
/// Cardinality: 9 (bounded by `SessionStore` methods)
pub fn record_store_latency(operation: &'static str, duration: Duration) {
    histogram!("sc_store_latency_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a conditional write rejected for a stale version or status.
///
/// Metric: `sc_store_conflicts_total`
/// Labels: `operation`
///
/// Sustained non-zero rates point at two instances driving the same session.
pub fn record_store_conflict(operation: &'static str) {
    counter!("sc_store_conflicts_total", "operation" => operation).increment(1);
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record an HTTP request handled by the adapter.
///
/// Metrics: `sc_http_request_duration_seconds`, `sc_http_requests_total`
/// Labels: `method`, `endpoint`, `status`
///
/// Session identifiers in paths are replaced with `{id}`.
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(path);
    let status = categorize_status_code(status_code);

    histogram!("sc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint.clone(),
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("sc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
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

/// Collapse dynamic path segments to keep label cardinality bounded.
fn normalize_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        ["", "api", "v1", "sessions"] => "/api/v1/sessions".to_string(),
        ["", "api", "v1", "sessions", _] => "/api/v1/sessions/{id}".to_string(),
        ["", "api", "v1", "sessions", _, action] if is_known_action(action) => {
            format!("/api/v1/sessions/{{id}}/{action}")
        }
        ["", "internal", "sessions", _, action] if is_known_action(action) => {
            format!("/internal/sessions/{{id}}/{action}")
        }
        ["", "api", "v1", "calls", "active"] => "/api/v1/calls/active".to_string(),
        ["", "health"] | ["", "ready"] | ["", "metrics"] => path.to_string(),
        _ => "other".to_string(),
    }
}

fn is_known_action(action: &str) -> bool {
    matches!(
        action,
        "ring" | "accept" | "reject" | "join" | "leave" | "end" | "participants" | "missed"
            | "failed"
    )
}

// ============================================================================
// Actor Mailbox Metrics
// ============================================================================

/// Set the mailbox depth for an actor type.
///
/// Metric: `sc_actor_mailbox_depth`
/// Labels: `actor_type` (session)
pub fn set_actor_mailbox_depth(actor_type: &'static str, depth: usize) {
    // usize to f64 conversion is safe for realistic mailbox depths
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_actor_mailbox_depth", "actor_type" => actor_type).set(depth as f64);
}

/// Record an actor task that ended by panicking.
///
/// Metric: `sc_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &'static str) {
    counter!("sc_actor_panics_total", "actor_type" => actor_type).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_recording_without_recorder_does_not_panic() {
        // The metrics crate records to a global no-op recorder when none is installed.
        record_transition(SessionStatus::Pending, SessionStatus::Ringing);
        set_sessions_live(3);
        record_room_full();
        record_operation("accept", "success", Duration::from_millis(4));
        record_error("join", "ROOM_FULL");
        record_store_latency("update", Duration::from_micros(800));
        record_store_conflict("update");
        set_actor_mailbox_depth("session", 12);
        record_actor_panic("session");
        record_http_request("GET", "/health", 200, Duration::from_millis(1));
    }

    #[test]
    fn test_endpoint_normalization() {
        let id = "0192f0c2-7d1e-7a4b-9c3d-5e6f7a8b9c0d";
        assert_eq!(normalize_endpoint("/api/v1/sessions"), "/api/v1/sessions");
        assert_eq!(
            normalize_endpoint(&format!("/api/v1/sessions/{id}")),
            "/api/v1/sessions/{id}"
        );
        assert_eq!(
            normalize_endpoint(&format!("/api/v1/sessions/{id}/accept")),
            "/api/v1/sessions/{id}/accept"
        );
        assert_eq!(
            normalize_endpoint(&format!("/internal/sessions/{id}/missed")),
            "/internal/sessions/{id}/missed"
        );
        assert_eq!(normalize_endpoint("/api/v1/sessions/x/unknown"), "other");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/wp-admin"), "other");
    }

    #[test]
    fn test_status_categories() {
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(409), "error");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_transition_counter_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_transition(SessionStatus::Ringing, SessionStatus::Active);
            record_transition(SessionStatus::Ringing, SessionStatus::Active);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let (key, _, _, value) = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "sc_session_transitions_total")
            .expect("transition counter should be registered");

        let labels: Vec<_> = key
            .key()
            .labels()
            .map(|l| (l.key().to_string(), l.value().to_string()))
            .collect();
        assert!(labels.contains(&("from".to_string(), "ringing".to_string())));
        assert!(labels.contains(&("to".to_string(), "active".to_string())));
        assert!(matches!(value, DebugValue::Counter(2)));
    }
}
