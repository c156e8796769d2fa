//! Prometheus recorder and the metric names the server emits.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const WEBHOOKS_RECEIVED: &str = "dupradar_webhooks_total";
pub const QUEUE_DEPTH: &str = "dupradar_pipeline_queue_depth";
pub const IN_FLIGHT: &str = "dupradar_pipeline_in_flight";
pub const RUNS_COMPLETED: &str = "dupradar_pipeline_runs_total";
pub const STEP_FAILURES: &str = "dupradar_pipeline_step_failures_total";
pub const COMMENTS_POSTED: &str = "dupradar_comments_posted_total";
pub const RUN_DURATION: &str = "dupradar_pipeline_run_duration_seconds";

const EXPONENTIAL_SECONDS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Install the global recorder. Call once per process.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)?
        .install_recorder()
}

/// Count a webhook by its intake outcome (`accepted`, `skipped`, `rejected`).
pub fn record_webhook(outcome: &'static str, reason: &'static str) {
    metrics::counter!(WEBHOOKS_RECEIVED, "outcome" => outcome, "reason" => reason).increment(1);
}
