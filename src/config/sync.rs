// src/config/sync.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::ingest::scheduler::SyncSchedulerCfg;
use crate::ingest::DEFAULT_RETENTION_HOURS;
use crate::sync::SyncSettings;

// --- env names ---
pub const ENV_API_BASE_URL: &str = "API_BASE_URL";
pub const ENV_JWT_TOKEN: &str = "JWT_TOKEN";
/// Older deployments spell it this way.
pub const ENV_JWT_TOKEN_LEGACY: &str = "JTW_TOKEN";
pub const ENV_SYNC_INTERVAL_SECS: &str = "SYNC_INTERVAL_SECS";
pub const ENV_SYNC_ALIGN: &str = "SYNC_ALIGN_TO_INTERVAL";
pub const ENV_RETENTION_HOURS: &str = "SYNC_RETENTION_HOURS";
pub const ENV_PRUNE_EXPIRED: &str = "SYNC_PRUNE_EXPIRED";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_STATIC_DIR: &str = "STATIC_DIR";

pub const DEFAULT_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_STATIC_DIR: &str = "public";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Base for both `getAllRunNews` and the news endpoints, no trailing `/`.
    pub api_base_url: String,
    pub api_token: String,
    pub interval_secs: u64,
    pub align_to_interval: bool,
    pub retention_hours: i64,
    pub prune_expired: bool,
    pub http_timeout: Option<Duration>,
    pub static_dir: PathBuf,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = get(ENV_API_BASE_URL)
            .ok_or_else(|| anyhow!("Missing {ENV_API_BASE_URL} env var"))?
            .trim_end_matches('/')
            .to_string();
        let api_token = get(ENV_JWT_TOKEN)
            .or_else(|| get(ENV_JWT_TOKEN_LEGACY))
            .ok_or_else(|| anyhow!("Missing {ENV_JWT_TOKEN} env var"))?;

        let interval_secs = match get(ENV_SYNC_INTERVAL_SECS) {
            Some(v) => parse_num::<u64>(ENV_SYNC_INTERVAL_SECS, &v)?,
            None => DEFAULT_INTERVAL_SECS,
        };
        if interval_secs == 0 {
            anyhow::bail!("{ENV_SYNC_INTERVAL_SECS} must be > 0");
        }
        let retention_hours = match get(ENV_RETENTION_HOURS) {
            Some(v) => parse_num::<i64>(ENV_RETENTION_HOURS, &v)?,
            None => DEFAULT_RETENTION_HOURS,
        };
        if retention_hours <= 0 {
            anyhow::bail!("{ENV_RETENTION_HOURS} must be > 0");
        }
        let align_to_interval = match get(ENV_SYNC_ALIGN) {
            Some(v) => parse_bool(ENV_SYNC_ALIGN, &v)?,
            None => true,
        };
        let prune_expired = match get(ENV_PRUNE_EXPIRED) {
            Some(v) => parse_bool(ENV_PRUNE_EXPIRED, &v)?,
            None => false,
        };
        let http_timeout = get(ENV_HTTP_TIMEOUT_SECS)
            .map(|v| parse_num::<u64>(ENV_HTTP_TIMEOUT_SECS, &v))
            .transpose()?
            .map(Duration::from_secs);
        let static_dir = get(ENV_STATIC_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        Ok(Self {
            api_base_url,
            api_token,
            interval_secs,
            align_to_interval,
            retention_hours,
            prune_expired,
            http_timeout,
            static_dir,
        })
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            retention: chrono::Duration::hours(self.retention_hours),
            prune_expired: self.prune_expired,
        }
    }

    pub fn scheduler_cfg(&self) -> SyncSchedulerCfg {
        SyncSchedulerCfg {
            interval_secs: self.interval_secs,
            align_to_interval: self.align_to_interval,
        }
    }

    /// Shared HTTP client for upstream and destination calls.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut b = reqwest::Client::builder();
        if let Some(t) = self.http_timeout {
            b = b.timeout(t);
        }
        b.build().context("building http client")
    }
}

fn parse_num<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{key}: invalid number {raw:?}"))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{key}: invalid boolean {other:?}")),
    }
}
