//! Offline core configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the dispatcher, the HTTP client and the sync engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the backend API (e.g., "http://localhost:5000").
    pub api_base_url: String,

    /// SQLite file for the offline cache. `None` keeps the cache in memory.
    pub store_path: Option<PathBuf>,

    /// Per-request timeout enforced by the HTTP client (seconds).
    pub request_timeout_secs: u64,

    /// Drain the queue when the engine starts online with pending writes.
    pub drain_on_startup: bool,

    /// Purge synced queue entries older than this after each drain.
    /// `None` keeps them forever.
    pub synced_retention_secs: Option<u64>,

    /// Capacity of the connectivity and command channels.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            store_path: None,
            request_timeout_secs: 30,
            drain_on_startup: true,
            synced_retention_secs: None,
            event_buffer: 64,
        }
    }
}

impl SyncConfig {
    /// Parses a JSON config supplied by the host; missing keys use defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(SyncError::Config("missing api_base_url".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "api_base_url must be http(s): {url}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(SyncError::Config("event_buffer must be positive".to_string()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }
}
