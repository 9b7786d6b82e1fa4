//! Prometheus metrics
//!
//! Recorder installation, the `/metrics` handler and the turn-level
//! counters the orchestrator reports.

use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

const TURN_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Install the global Prometheus recorder.
///
/// Safe to call more than once; later calls return the first handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PROMETHEUS
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Full("stack_advisor_turn_duration_seconds".to_string()),
                    TURN_DURATION_BUCKETS,
                )?
                .install_recorder()
        })
        .cloned()
}

/// Render metrics in the Prometheus text format
pub async fn metrics_handler() -> Response {
    match PROMETHEUS.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response(),
    }
}

/// Record one finished turn
pub fn record_turn(outcome: &'static str, duration: Duration) {
    metrics::counter!("stack_advisor_turns_total", "outcome" => outcome).increment(1);
    metrics::histogram!("stack_advisor_turn_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

/// Record a session save that lost a race with another turn
pub fn record_store_conflict() {
    metrics::counter!("stack_advisor_store_conflicts_total").increment(1);
}
