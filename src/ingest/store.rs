// src/ingest/store.rs
//! HTTP client for the destination news table.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ingest::error::StoreError;
use crate::ingest::types::{NewsRecord, NewsStore, RecordId};

#[derive(Clone)]
pub struct HttpNewsStore {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct NewsObject<'a> {
    id: &'a RecordId,
    link: &'a str,
    title: &'a str,
    description: &'a str,
    #[serde(rename = "createdAt")]
    created_at: String,
}

#[derive(Debug, Serialize)]
struct UpdateNewsRequest<'a> {
    objects: Vec<NewsObject<'a>>,
}

#[derive(Debug, Deserialize)]
struct UpdateNewsResponse {
    insert_news: Option<AffectedRows>,
}

#[derive(Debug, Deserialize)]
struct AffectedRows {
    affected_rows: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ExistingRow {
    id: RecordId,
}

#[derive(Debug, Deserialize)]
struct AllNewsResponse {
    #[serde(default)]
    news: Option<Vec<serde_json::Value>>,
}

/// Render the batch body. Timestamps go out as UTC ISO-8601 with
/// millisecond precision (`2024-05-01T10:00:00.000Z`).
pub fn build_update_body(batch: &[NewsRecord]) -> serde_json::Result<serde_json::Value> {
    let objects = batch
        .iter()
        .map(|r| NewsObject {
            id: &r.id,
            link: &r.link,
            title: &r.title,
            description: &r.description,
            created_at: r.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
        .collect();
    serde_json::to_value(UpdateNewsRequest { objects })
}

impl HttpNewsStore {
    pub fn new(client: Client, base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a prepared request; non-success statuses become `Response` errors
    /// carrying the destination's message. Returns the body text on success.
    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<String, StoreError> {
        let resp = req.send().await.map_err(|e| {
            tracing::error!(target: "sync", error = %e, call = what, "destination unreachable");
            StoreError::from(e)
        })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!(target: "sync", error = %e, call = what, "reading destination body failed");
            StoreError::Unexpected(e.to_string())
        })?;
        if !status.is_success() {
            tracing::error!(target: "sync", status = status.as_u16(), body = %body, call = what, "destination API error");
            return Err(StoreError::from_response_body(status.as_u16(), &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl NewsStore for HttpNewsStore {
    async fn existing_ids(&self) -> Result<HashSet<RecordId>, StoreError> {
        let body = self
            .send(self.client.get(self.url("getAllNews")), "getAllNews")
            .await?;
        let parsed: AllNewsResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Unexpected(format!("getAllNews body: {e}")))?;

        let rows = parsed.news.unwrap_or_default();
        let total = rows.len();
        // Rows without a usable id cannot match a candidate; skip them.
        let ids: HashSet<RecordId> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value::<ExistingRow>(v).ok())
            .map(|row| row.id)
            .collect();
        tracing::info!(target: "sync", rows = total, ids = ids.len(), "fetched existing news");
        Ok(ids)
    }

    async fn upsert(&self, batch: &[NewsRecord]) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let body = build_update_body(batch).map_err(|e| StoreError::Unexpected(e.to_string()))?;

        tracing::info!(target: "sync", records = batch.len(), "upserting news batch");
        let text = self
            .send(
                self.client
                    .post(self.url("updateNews"))
                    .bearer_auth(&self.token)
                    .json(&body),
                "updateNews",
            )
            .await?;

        let affected = serde_json::from_str::<UpdateNewsResponse>(&text)
            .ok()
            .and_then(|r| r.insert_news)
            .and_then(|r| r.affected_rows)
            .unwrap_or(0);
        tracing::info!(target: "sync", affected_rows = affected, "destination accepted batch");
        Ok(affected)
    }

    async fn delete_expired(&self) -> Result<serde_json::Value, StoreError> {
        let text = self
            .send(
                self.client
                    .delete(self.url("deleteExpiredNews"))
                    .bearer_auth(&self.token),
                "deleteExpiredNews",
            )
            .await?;
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::Null))
    }
}
