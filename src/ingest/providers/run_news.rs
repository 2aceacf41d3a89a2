// src/ingest/providers/run_news.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use serde_json::Value;

use crate::ingest::types::{RunEntry, RunSource};

enum Mode {
    Fixture(String),
    Http { endpoint: String, client: Client },
}

/// Upstream "all runs" provider (`GET {base}/getAllRunNews`).
pub struct RunNewsProvider {
    mode: Mode,
}

impl RunNewsProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            mode: Mode::Http {
                endpoint: format!("{}/getAllRunNews", base_url.trim_end_matches('/')),
                client,
            },
        }
    }

    /// Serve a canned response body instead of calling the network.
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }
}

/// Parse a `getAllRunNews` body. A missing or null `run` is an empty batch;
/// a body that is not an object, or a `run` that is not an array, is an
/// error. Individual malformed entries are skipped.
pub fn parse_runs_body(body: &str) -> Result<Vec<RunEntry>> {
    let t0 = std::time::Instant::now();
    let root: Value = serde_json::from_str(body).context("parsing getAllRunNews json")?;
    let Some(obj) = root.as_object() else {
        bail!("getAllRunNews: top level is not an object");
    };

    let entries = match obj.get("run") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(a)) => a,
        Some(_) => bail!("getAllRunNews: `run` is not an array"),
    };

    let mut out = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;
    for entry in entries {
        match serde_json::from_value::<RunEntry>(entry.clone()) {
            Ok(run) => out.push(run),
            Err(e) => {
                skipped += 1;
                tracing::debug!(target: "sync", error = %e, "skipping malformed run entry");
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(target: "sync", skipped, kept = out.len(), "malformed run entries skipped");
        counter!("sync_runs_malformed_total").increment(skipped as u64);
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("sync_parse_ms").record(ms);
    Ok(out)
}

#[async_trait]
impl RunSource for RunNewsProvider {
    async fn fetch_runs(&self) -> Result<Vec<RunEntry>> {
        match &self.mode {
            Mode::Fixture(s) => parse_runs_body(s),
            Mode::Http { endpoint, client } => {
                let resp = client
                    .get(endpoint)
                    .send()
                    .await
                    .context("getAllRunNews request")?
                    .error_for_status()
                    .context("getAllRunNews status")?;
                let body = resp.text().await.context("getAllRunNews body")?;
                parse_runs_body(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "run-news"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_run_key_is_empty_batch() {
        assert!(parse_runs_body("{}").unwrap().is_empty());
        assert!(parse_runs_body(r#"{"run":null}"#).unwrap().is_empty());
    }

    #[test]
    fn wrong_shapes_fail() {
        assert!(parse_runs_body("[]").is_err());
        assert!(parse_runs_body(r#"{"run":{}}"#).is_err());
        assert!(parse_runs_body("not json").is_err());
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let body = r#"{"run":[
            {"id":"ok","finishedAt":"2024-05-01T10:00:00Z","serializableOutput":{}},
            {"id":"no-time","serializableOutput":{}},
            {"finishedAt":"2024-05-01T10:00:00Z"},
            {"id":"bad-time","finishedAt":"yesterday"},
            {"id":"bad-output","finishedAt":"2024-05-01T10:00:00Z","serializableOutput":[1]}
        ]}"#;
        let runs = parse_runs_body(body).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id.to_string(), "ok");
    }

    #[test]
    fn zone_less_finished_at_keeps_the_run() {
        let body = r#"{"run":[{"id":"naive","finishedAt":"2024-05-01T10:00:00.123","serializableOutput":{}}]}"#;
        let runs = parse_runs_body(body).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].finished_at.to_rfc3339(), "2024-05-01T10:00:00.123+00:00");
    }

    #[tokio::test]
    async fn fixture_mode_parses_body() {
        let p = RunNewsProvider::from_fixture(
            r#"{"run":[{"id":1,"finishedAt":"2024-05-01T10:00:00.123Z"}]}"#,
        );
        let runs = p.fetch_runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(p.name(), "run-news");
    }
}
