use anyhow::Context;
use axum::{extract::State, routing::get, Router};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Millisecond buckets shared by the run and parse timing histograms.
const TIMING_BUCKETS_MS: &[f64] = &[5.0, 25.0, 100.0, 250.0, 1_000.0, 5_000.0, 30_000.0];

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Fails if a recorder is
    /// already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Suffix("_ms".into()), TIMING_BUCKETS_MS)
            .context("prometheus: timing buckets")?
            .install_recorder()
            .context("prometheus: install recorder")?;

        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.handle.clone())
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
