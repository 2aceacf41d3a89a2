// src/ingest/mod.rs
//! Pipeline stages between the upstream run API and the destination store:
//! flatten, recency window, required fields, id-or-title dedup, existing-set diff.

pub mod error;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod types;

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

use crate::ingest::types::{NewsItem, NewsRecord, RecordId, RunEntry, RunSource};

/// Records older than this are never synced.
pub const DEFAULT_RETENTION_HOURS: i64 = 72;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_runs_total", "Sync runs started.");
        describe_counter!(
            "sync_run_failures_total",
            "Sync runs that ended with a destination error."
        );
        describe_counter!(
            "sync_runs_rejected_total",
            "Triggers rejected because a run was already in progress."
        );
        describe_counter!(
            "sync_fetch_errors_total",
            "Upstream fetch/parse errors (absorbed)."
        );
        describe_counter!(
            "sync_runs_malformed_total",
            "Upstream run entries skipped as malformed."
        );
        describe_counter!(
            "sync_candidates_total",
            "Records surviving flatten + recency + required fields."
        );
        describe_counter!(
            "sync_dedup_dropped_total",
            "Records dropped by id-or-title deduplication."
        );
        describe_counter!(
            "sync_existing_skipped_total",
            "Candidates already present at the destination."
        );
        describe_counter!(
            "sync_inserted_total",
            "Rows the destination reported as inserted."
        );
        describe_gauge!(
            "sync_last_success_ts",
            "Unix ts of the last successful sync run."
        );
        describe_histogram!("sync_parse_ms", "Upstream body parse time in milliseconds.");
        describe_histogram!("sync_run_ms", "Sync run duration in milliseconds.");
    });
}

/// Flatten every output group of every run into records stamped with the
/// run's id and completion time. Groups that are not arrays and items that
/// are not news-shaped objects are skipped.
pub fn flatten_runs(runs: Vec<RunEntry>) -> Vec<NewsRecord> {
    let mut out = Vec::new();
    for run in runs {
        let Some(output) = run.serializable_output else {
            continue;
        };
        for (group, value) in output {
            let Some(items) = value.as_array() else {
                tracing::debug!(target: "sync", run = %run.id, %group, "output group is not an array");
                continue;
            };
            for item in items {
                if !item.is_object() {
                    continue;
                }
                let news: NewsItem = match serde_json::from_value(item.clone()) {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::debug!(target: "sync", run = %run.id, %group, error = %e, "skipping malformed news item");
                        continue;
                    }
                };
                out.push(NewsRecord {
                    id: run.id.clone(),
                    link: news.link.unwrap_or_default(),
                    title: news.title.unwrap_or_default(),
                    description: news.description.unwrap_or_default(),
                    created_at: run.finished_at,
                });
            }
        }
    }
    out
}

/// Keep records with `now - created_at <= window`. Inclusive at the boundary.
pub fn filter_recent(records: Vec<NewsRecord>, now: DateTime<Utc>, window: Duration) -> Vec<NewsRecord> {
    let cutoff = now - window;
    records
        .into_iter()
        .filter(|r| r.created_at >= cutoff)
        .collect()
}

/// Present and non-empty. Whitespace counts as content.
pub fn has_required_fields(r: &NewsRecord) -> bool {
    !r.id.is_empty() && !r.link.is_empty() && !r.title.is_empty() && !r.description.is_empty()
}

pub fn filter_required(records: Vec<NewsRecord>) -> Vec<NewsRecord> {
    records.into_iter().filter(has_required_fields).collect()
}

/// First occurrence wins. A record is dropped when its id OR its title was
/// already accepted earlier in the input, so two distinct records sharing a
/// title collide. Titles are compared verbatim.
pub fn dedupe(records: Vec<NewsRecord>) -> Vec<NewsRecord> {
    let mut seen_ids: HashSet<RecordId> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(records.len());

    for r in records {
        if seen_ids.contains(&r.id) || seen_titles.contains(&r.title) {
            continue;
        }
        seen_ids.insert(r.id.clone());
        seen_titles.insert(r.title.clone());
        keep.push(r);
    }
    keep
}

/// Drop candidates whose id the destination already stores.
pub fn diff_against_existing(
    candidates: Vec<NewsRecord>,
    existing: &HashSet<RecordId>,
) -> Vec<NewsRecord> {
    candidates
        .into_iter()
        .filter(|r| !existing.contains(&r.id))
        .collect()
}

/// Final gate before the write: required fields, dedup, and the recency
/// window again, since time has passed since fetch.
pub fn prepare_batch(
    new_records: Vec<NewsRecord>,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<NewsRecord> {
    let valid = filter_required(new_records);
    let unique = dedupe(valid);
    filter_recent(unique, now, window)
}

/// Fetch stage. Upstream failures are logged and yield an empty set so the
/// cycle becomes a no-op.
pub async fn fetch_candidates(
    source: &dyn RunSource,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<NewsRecord> {
    ensure_metrics_described();

    let runs = match source.fetch_runs().await {
        Ok(runs) => runs,
        Err(e) => {
            tracing::warn!(target: "sync", error = ?e, source = source.name(), "upstream fetch failed");
            counter!("sync_fetch_errors_total").increment(1);
            return Vec::new();
        }
    };
    tracing::info!(target: "sync", runs = runs.len(), source = source.name(), "fetched runs");

    let parsed = flatten_runs(runs);
    let parsed_len = parsed.len();
    let recent = filter_recent(parsed, now, window);
    let recent_len = recent.len();
    let candidates = filter_required(recent);

    tracing::info!(
        target: "sync",
        parsed = parsed_len,
        recent = recent_len,
        candidates = candidates.len(),
        "flattened upstream runs"
    );
    counter!("sync_candidates_total").increment(candidates.len() as u64);
    candidates
}
