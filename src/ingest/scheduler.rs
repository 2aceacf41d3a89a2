// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::sync::{SyncError, SyncOrchestrator};

#[derive(Clone, Copy, Debug)]
pub struct SyncSchedulerCfg {
    pub interval_secs: u64,
    /// First tick on the next wall-clock multiple of the interval
    /// (top of the hour for 3600s) instead of immediately.
    pub align_to_interval: bool,
}

impl Default for SyncSchedulerCfg {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            align_to_interval: true,
        }
    }
}

/// Time from `now` until the next instant whose unix time is a multiple of
/// `interval_secs`. Zero when `now` sits exactly on a boundary.
pub fn delay_until_aligned(now: DateTime<Utc>, interval_secs: u64) -> Duration {
    if interval_secs == 0 {
        return Duration::ZERO;
    }
    let interval_ms = interval_secs.saturating_mul(1_000);
    let now_ms = now.timestamp_millis().max(0) as u64;
    let rem = now_ms % interval_ms;
    if rem == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(interval_ms - rem)
    }
}

/// Spawn the periodic trigger. Each tick calls the same entry point as the
/// manual trigger; a tick that lands on an in-flight run is skipped.
pub fn spawn_sync_scheduler(orch: Arc<SyncOrchestrator>, cfg: SyncSchedulerCfg) -> JoinHandle<()> {
    let period = Duration::from_secs(cfg.interval_secs.max(1));
    let first = if cfg.align_to_interval {
        delay_until_aligned(Utc::now(), cfg.interval_secs)
    } else {
        Duration::ZERO
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            target: "sync",
            interval_secs = period.as_secs(),
            first_in_secs = first.as_secs(),
            "sync scheduler started"
        );
        loop {
            ticker.tick().await;
            tracing::info!(target: "sync", "starting scheduled sync task");
            match orch.run_once().await {
                Ok(outcome) => tracing::debug!(target: "sync", ?outcome, "scheduled sync finished"),
                Err(SyncError::AlreadyRunning) => {
                    tracing::warn!(target: "sync", "scheduled tick skipped: run in progress")
                }
                Err(e) => tracing::warn!(target: "sync", error = %e, "scheduled sync failed"),
            }
        }
    })
}
