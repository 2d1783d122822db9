// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
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

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Poll cycles started.");
        describe_counter!("poll_cycle_errors_total", "Poll cycles ending in a fatal error.");
        describe_counter!(
            "fetch_strategy_failures_total",
            "Fetch strategy attempts that errored, by strategy."
        );
        describe_counter!("notifications_new_total", "Records newer than the watermark.");
        describe_counter!(
            "notifications_delivered_total",
            "Alerts accepted by a transport, by channel."
        );
        describe_counter!(
            "notifications_failed_total",
            "Alerts rejected by a transport, by channel."
        );
        describe_gauge!("poll_watermark_ts", "Unix ts of the stored watermark.");
        describe_gauge!("poll_last_run_ts", "Unix ts when a poll cycle last finished.");
    });
}
