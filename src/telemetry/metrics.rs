//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering
/// metrics. The recorder is the injected metrics sink for the whole
/// engine; install it once at process start.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    // Buckets sized for remote check-access latency, which is dominated by
    // the policy service round trip.
    let buckets = vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus
/// output includes HELP/TYPE lines for all metrics from startup (not just
/// after first use).
pub fn describe_metrics() {
    describe_counter!(
        "warden_checkaccess_requests_total",
        "Number of check access calls by HTTP status code"
    );
    describe_counter!(
        "warden_checkaccess_success_total",
        "Number of successful check access calls"
    );
    describe_counter!(
        "warden_checkaccess_failure_total",
        "Number of failed check access calls by HTTP status code"
    );
    describe_counter!(
        "warden_checkaccess_throttled_total",
        "Number of throttled check access calls"
    );
    describe_histogram!(
        "warden_checkaccess_duration_seconds",
        "Check access request latency by HTTP status code"
    );
    describe_counter!(
        "warden_pool_recycle_total",
        "Connection pool recycles by reason"
    );
    describe_counter!(
        "warden_token_refresh_total",
        "Token refresh attempts by result"
    );

    // Counters gated behind specific code-paths need an explicit
    // zero-increment for HELP/TYPE lines to appear before first use.
    counter!("warden_checkaccess_requests_total", "code" => "200").absolute(0);
    counter!("warden_checkaccess_success_total").absolute(0);
    counter!("warden_checkaccess_failure_total", "code" => "500").absolute(0);
    counter!("warden_checkaccess_throttled_total").absolute(0);
    histogram!("warden_checkaccess_duration_seconds", "code" => "200").record(0.0);
    counter!("warden_pool_recycle_total", "reason" => "throttled").absolute(0);
    counter!("warden_token_refresh_total", "result" => "success").absolute(0);
}
