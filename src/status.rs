//! status.rs: in-memory outcome of the most recent sync run.
//! Lost on restart; the orchestrator is the only writer.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot served by `/api/last-sync-info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    /// Time of the last successful run; `None` until the first success.
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_updated_count: u64,
    /// Message of the most recent failure, cleared on success.
    pub last_sync_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    inner: RwLock<RunStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RunStatus {
        self.inner.read().expect("status rwlock poisoned").clone()
    }

    pub(crate) fn record_success(&self, at: DateTime<Utc>, inserted: u64) {
        let mut s = self.inner.write().expect("status rwlock poisoned");
        s.last_sync_time = Some(at);
        s.last_updated_count = inserted;
        s.last_sync_error = None;
    }

    /// Keeps the last successful time/count untouched.
    pub(crate) fn record_failure(&self, message: impl Into<String>) {
        let mut s = self.inner.write().expect("status rwlock poisoned");
        s.last_sync_error = Some(message.into());
    }
}
