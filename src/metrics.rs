use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration so the series show up on /metrics even
/// before their first increment.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_passes_total", "Completed scheduler passes.");
        describe_counter!("watch_items_seen_total", "Items returned by the source adapter.");
        describe_counter!("watch_dispatches_total", "Notifications delivered.");
        describe_counter!(
            "watch_dispatch_failures_total",
            "Notification deliveries that failed after retries."
        );
        describe_counter!("watch_quota_errors_total", "Quota-exceeded upstream responses.");
        describe_counter!(
            "watch_quota_suspensions_total",
            "Times the backoff guard opened a cooldown window."
        );
        describe_counter!("watch_tier_skips_total", "Expensive tiers skipped while suspended.");
        describe_counter!("watch_fetch_errors_total", "Transient strategy failures.");
        describe_counter!("watch_upstream_calls_total", "Successful upstream API calls.");
        describe_counter!("watch_fetch_items_total", "Items produced by a winning strategy.");
        describe_counter!("watch_feed_entries_total", "Entries parsed from public feeds.");
        describe_gauge!("watch_enabled_tenants", "Enabled tenants in the last pass.");
        describe_histogram!("watch_upstream_ms", "Upstream API call latency.");
        describe_histogram!("watch_feed_parse_ms", "Public feed parse time.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_metrics_described();
        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
