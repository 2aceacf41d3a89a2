//! News Sync Service: binary entrypoint.
//! Boots the Axum HTTP server, the hourly sync scheduler, and metrics.

use anyhow::Context;
use news_sync::{
    api::{self, AppState},
    build_orchestrator,
    config::sync::SyncConfig,
    ingest::scheduler::spawn_sync_scheduler,
    metrics::Metrics,
};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON with SYNC_LOG_FORMAT=json.
/// `try_init` so a subscriber installed by the host runtime wins.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_sync=info,warn"));

    let json = std::env::var("SYNC_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = SyncConfig::from_env().context("loading sync config")?;
    tracing::info!(
        base_url = %cfg.api_base_url,
        interval_secs = cfg.interval_secs,
        retention_hours = cfg.retention_hours,
        prune_expired = cfg.prune_expired,
        token_len = cfg.api_token.len(),
        "sync config loaded"
    );

    let orch = build_orchestrator(&cfg)?;
    let _scheduler = spawn_sync_scheduler(orch.clone(), cfg.scheduler_cfg());

    let mut router = api::router(AppState { sync: orch }, &cfg.static_dir);
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
