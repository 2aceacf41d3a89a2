// src/ingest/types.rs
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ingest::error::StoreError;

/// Opaque upstream identifier. Upstream and destination may disagree on
/// whether ids are JSON numbers or strings, so equality goes through the
/// textual form while serialization keeps the original JSON type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    pub fn is_empty(&self) -> bool {
        match self {
            RecordId::Int(_) => false,
            RecordId::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RecordId::Int(a), RecordId::Int(b)) => a == b,
            (RecordId::Text(a), RecordId::Text(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/// A news item flattened out of an upstream run, stamped with the run's
/// completion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsRecord {
    pub id: RecordId,
    pub link: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One entry of `GET /getAllRunNews`. Parsed entry-by-entry so a malformed
/// run only drops itself.
#[derive(Debug, Clone, Deserialize)]
pub struct RunEntry {
    pub id: RecordId,
    #[serde(rename = "finishedAt", deserialize_with = "de_finished_at")]
    pub finished_at: DateTime<Utc>,
    #[serde(rename = "serializableOutput", default)]
    pub serializable_output: Option<serde_json::Map<String, serde_json::Value>>,
}

/// RFC 3339, or a zone-less `timestamp` column value read as UTC.
fn de_finished_at<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    parse_finished_at(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid finishedAt {raw:?}")))
}

pub(crate) fn parse_finished_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// News-shaped value inside an output group. Missing fields are kept as
/// `None` and rejected later by the required-fields filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Upstream collaborator: returns the raw run entries it could parse.
#[async_trait::async_trait]
pub trait RunSource: Send + Sync {
    async fn fetch_runs(&self) -> anyhow::Result<Vec<RunEntry>>;
    fn name(&self) -> &'static str;
}

/// Destination collaborator.
#[async_trait::async_trait]
pub trait NewsStore: Send + Sync {
    /// Ids of every record currently stored. No paging.
    async fn existing_ids(&self) -> Result<HashSet<RecordId>, StoreError>;

    /// Single batched write; returns the reported affected rows (0 if absent).
    async fn upsert(&self, batch: &[NewsRecord]) -> Result<u64, StoreError>;

    /// Ask the destination to drop records past its own retention.
    async fn delete_expired(&self) -> Result<serde_json::Value, StoreError>;
}
