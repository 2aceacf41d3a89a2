// src/sync.rs
//! Sync orchestrator: fetch -> dedupe -> diff/filter -> upsert, with a run
//! guard so the scheduler and the manual trigger never overlap.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use metrics::{counter, gauge, histogram};

use crate::ingest::{
    self,
    error::StoreError,
    types::{NewsStore, RunSource},
    DEFAULT_RETENTION_HOURS,
};
use crate::status::{RunStatus, StatusTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Deduplicating,
    Diffing,
    Upserting,
    Succeeded,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Deduplicating => "deduplicating",
            SyncPhase::Diffing => "diffing",
            SyncPhase::Upserting => "upserting",
            SyncPhase::Succeeded => "succeeded",
            SyncPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("sync already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing eligible upstream; status left untouched.
    NothingFetched,
    /// Run completed; `inserted` is what the destination reported.
    Synced { inserted: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub retention: Duration,
    pub prune_expired: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
            prune_expired: false,
        }
    }
}

pub struct SyncOrchestrator {
    source: Arc<dyn RunSource>,
    store: Arc<dyn NewsStore>,
    settings: SyncSettings,
    status: StatusTracker,
    running: AtomicBool,
    phase: Mutex<SyncPhase>,
}

/// Clears the in-progress flag and returns the phase to `Idle` however the
/// run ends.
struct RunGuard<'a> {
    orch: &'a SyncOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orch.set_phase(SyncPhase::Idle);
        self.orch.running.store(false, Ordering::Release);
    }
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn RunSource>,
        store: Arc<dyn NewsStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            settings,
            status: StatusTracker::new(),
            running: AtomicBool::new(false),
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status.snapshot()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().expect("phase mutex poisoned")
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_phase(&self, p: SyncPhase) {
        *self.phase.lock().expect("phase mutex poisoned") = p;
        tracing::debug!(target: "sync", phase = %p, "phase");
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { orch: self })
    }

    /// Single entry point for both the scheduler and the manual trigger.
    /// A second call while a run is in flight is rejected, not queued.
    pub async fn run_once(&self) -> Result<RunOutcome, SyncError> {
        ingest::ensure_metrics_described();

        let Some(_guard) = self.try_begin() else {
            tracing::warn!(target: "sync", "sync trigger rejected: run already in progress");
            counter!("sync_runs_rejected_total").increment(1);
            return Err(SyncError::AlreadyRunning);
        };

        counter!("sync_runs_total").increment(1);
        let t0 = std::time::Instant::now();
        let res = self.pipeline().await;
        histogram!("sync_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match &res {
            Ok(RunOutcome::Synced { inserted }) => {
                let now = Utc::now();
                self.status.record_success(now, *inserted);
                self.set_phase(SyncPhase::Succeeded);
                counter!("sync_inserted_total").increment(*inserted);
                gauge!("sync_last_success_ts").set(now.timestamp() as f64);
                tracing::info!(target: "sync", inserted, "sync run succeeded");
            }
            Ok(RunOutcome::NothingFetched) => {
                tracing::info!(target: "sync", "no eligible upstream records; nothing to do");
            }
            Err(e) => {
                self.status.record_failure(e.to_string());
                self.set_phase(SyncPhase::Failed);
                counter!("sync_run_failures_total").increment(1);
                tracing::error!(target: "sync", error = %e, "sync run failed");
            }
        }
        res
    }

    async fn pipeline(&self) -> Result<RunOutcome, SyncError> {
        let window = self.settings.retention;

        if self.settings.prune_expired {
            match self.store.delete_expired().await {
                Ok(resp) => tracing::info!(target: "sync", response = %resp, "expired news deleted"),
                Err(e) => tracing::warn!(target: "sync", error = %e, "deleting expired news failed"),
            }
        }

        self.set_phase(SyncPhase::Fetching);
        let candidates = ingest::fetch_candidates(self.source.as_ref(), Utc::now(), window).await;
        if candidates.is_empty() {
            return Ok(RunOutcome::NothingFetched);
        }

        self.set_phase(SyncPhase::Deduplicating);
        let before = candidates.len();
        let unique = ingest::dedupe(candidates);
        counter!("sync_dedup_dropped_total").increment((before - unique.len()) as u64);

        self.set_phase(SyncPhase::Diffing);
        let existing = self.store.existing_ids().await?;
        let before = unique.len();
        let fresh = ingest::diff_against_existing(unique, &existing);
        counter!("sync_existing_skipped_total").increment((before - fresh.len()) as u64);

        let batch = ingest::prepare_batch(fresh, Utc::now(), window);
        if batch.is_empty() {
            tracing::info!(target: "sync", "no new records to sync");
            return Ok(RunOutcome::Synced { inserted: 0 });
        }

        self.set_phase(SyncPhase::Upserting);
        let inserted = self.store.upsert(&batch).await?;
        Ok(RunOutcome::Synced { inserted })
    }
}
