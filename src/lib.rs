// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod status;
pub mod sync;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::status::RunStatus;
pub use crate::sync::{RunOutcome, SyncError, SyncOrchestrator, SyncPhase, SyncSettings};

use std::sync::Arc;

use crate::config::sync::SyncConfig;
use crate::ingest::{providers::run_news::RunNewsProvider, store::HttpNewsStore};

/// Wire the HTTP upstream and destination clients from configuration.
pub fn build_orchestrator(cfg: &SyncConfig) -> anyhow::Result<Arc<SyncOrchestrator>> {
    let client = cfg.http_client()?;
    let source = RunNewsProvider::new(client.clone(), &cfg.api_base_url);
    let store = HttpNewsStore::new(client, &cfg.api_base_url, cfg.api_token.clone());
    Ok(Arc::new(SyncOrchestrator::new(
        Arc::new(source),
        Arc::new(store),
        cfg.sync_settings(),
    )))
}
