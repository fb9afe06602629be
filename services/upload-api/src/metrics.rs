//! Prometheus metrics exposition
//!
//! Counters served on `/metrics`:
//!
//! - `gateway_logins_total` (counter): label `outcome`
//! - `gateway_guard_rejections_total` (counter): label `kind`
//! - `gateway_uploads_total` (counter): label `outcome`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed login attempt with its outcome.
pub fn record_login(outcome: &str) {
    metrics::counter!("gateway_logins_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record an access-guard rejection with its kind.
pub fn record_guard_rejection(kind: &str) {
    metrics::counter!("gateway_guard_rejections_total", "kind" => kind.to_string()).increment(1);
}

/// Record an upload attempt with its outcome.
pub fn record_upload(outcome: &str) {
    metrics::counter!("gateway_uploads_total", "outcome" => outcome.to_string()).increment(1);
}
