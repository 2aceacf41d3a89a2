// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;
use tokio::sync::Notify;

use news_sync::ingest::error::StoreError;
use news_sync::ingest::types::{NewsRecord, NewsStore, RecordId, RunEntry, RunSource};

pub fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn hours_ago(h: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(h)
}

/// One upstream run with a single output group.
pub fn run_json(id: serde_json::Value, finished_at: DateTime<Utc>, items: &[(&str, &str, &str)]) -> serde_json::Value {
    let news: Vec<_> = items
        .iter()
        .map(|(link, title, description)| json!({ "link": link, "title": title, "description": description }))
        .collect();
    json!({
        "id": id,
        "finishedAt": iso(finished_at),
        "serializableOutput": { "news": news }
    })
}

pub fn run_entry(id: serde_json::Value, finished_at: DateTime<Utc>, items: &[(&str, &str, &str)]) -> RunEntry {
    serde_json::from_value(run_json(id, finished_at, items)).expect("valid run entry")
}

pub fn record(id: RecordId, title: &str, created_at: DateTime<Utc>) -> NewsRecord {
    NewsRecord {
        id,
        link: format!("https://news.test/{title}"),
        title: title.to_string(),
        description: format!("about {title}"),
        created_at,
    }
}

pub struct StaticSource(pub Vec<RunEntry>);

#[async_trait]
impl RunSource for StaticSource {
    async fn fetch_runs(&self) -> anyhow::Result<Vec<RunEntry>> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct FailingSource;

#[async_trait]
impl RunSource for FailingSource {
    async fn fetch_runs(&self) -> anyhow::Result<Vec<RunEntry>> {
        anyhow::bail!("upstream down")
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Blocks in `fetch_runs` until the gate is notified.
pub struct GatedSource {
    pub gate: Arc<Notify>,
    pub runs: Vec<RunEntry>,
}

#[async_trait]
impl RunSource for GatedSource {
    async fn fetch_runs(&self) -> anyhow::Result<Vec<RunEntry>> {
        self.gate.notified().await;
        Ok(self.runs.clone())
    }
    fn name(&self) -> &'static str {
        "gated"
    }
}

pub struct MockStore {
    pub existing: HashSet<RecordId>,
    /// `Some(err)` makes `existing_ids` fail.
    pub existing_result: Mutex<Option<StoreError>>,
    pub upsert_result: Mutex<Result<u64, StoreError>>,
    pub prune_result: Result<serde_json::Value, StoreError>,
    pub upserts: Mutex<Vec<Vec<NewsRecord>>>,
    pub existing_calls: AtomicUsize,
    pub prune_calls: AtomicUsize,
}

impl MockStore {
    pub fn new(existing: &[RecordId], upsert_result: Result<u64, StoreError>) -> Self {
        Self {
            existing: existing.iter().cloned().collect(),
            existing_result: Mutex::new(None),
            upsert_result: Mutex::new(upsert_result),
            prune_result: Ok(json!({})),
            upserts: Mutex::new(vec![]),
            existing_calls: AtomicUsize::new(0),
            prune_calls: AtomicUsize::new(0),
        }
    }

    /// Store that reports exactly what it was sent.
    pub fn accepting(existing: &[RecordId]) -> Self {
        Self::new(existing, Ok(u64::MAX))
    }

    pub fn set_upsert_result(&self, r: Result<u64, StoreError>) {
        *self.upsert_result.lock().unwrap() = r;
    }

    pub fn fail_existing(&self, err: StoreError) {
        *self.existing_result.lock().unwrap() = Some(err);
    }

    pub fn upserted(&self) -> Vec<Vec<NewsRecord>> {
        self.upserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl NewsStore for MockStore {
    async fn existing_ids(&self) -> Result<HashSet<RecordId>, StoreError> {
        self.existing_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.existing_result.lock().unwrap() {
            Some(err) => Err(err.clone()),
            None => Ok(self.existing.clone()),
        }
    }

    async fn upsert(&self, batch: &[NewsRecord]) -> Result<u64, StoreError> {
        self.upserts.lock().unwrap().push(batch.to_vec());
        match &*self.upsert_result.lock().unwrap() {
            Ok(u64::MAX) => Ok(batch.len() as u64),
            other => other.clone(),
        }
    }

    async fn delete_expired(&self) -> Result<serde_json::Value, StoreError> {
        self.prune_calls.fetch_add(1, Ordering::SeqCst);
        self.prune_result.clone()
    }
}
