//! Offline client configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Offline client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the reconciliation server
    pub server_url: String,

    /// Account that owns records created on this device
    pub user_id: String,

    /// Durable queue database (relative to `app.data_dir` if not absolute)
    pub queue_database: PathBuf,

    /// Upper bound on a single sync request
    pub request_timeout_secs: u64,

    /// Maximum records per sync request
    pub batch_size: usize,

    /// Safety-net drain interval while idle
    pub drain_interval_secs: u64,

    /// How long connectivity must stay up before it counts as restored
    pub debounce_ms: u64,

    /// Interval between reachability probes
    pub probe_interval_secs: u64,

    /// URLs probed with HEAD requests; empty means the server's health endpoint
    pub probe_urls: Vec<String>,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Probe targets, defaulting to the server's health endpoint
    pub fn effective_probe_urls(&self) -> Vec<String> {
        if self.probe_urls.is_empty() {
            vec![format!("{}/healthz", self.server_url.trim_end_matches('/'))]
        } else {
            self.probe_urls.clone()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            user_id: "local-user".to_string(),
            queue_database: PathBuf::from("client.db"),
            request_timeout_secs: 15,
            batch_size: 5,
            drain_interval_secs: 60,
            debounce_ms: 2_000,
            probe_interval_secs: 30,
            probe_urls: Vec::new(),
        }
    }
}

impl ConfigSection for ClientConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::http_url(&self.server_url, "client.server_url"),
            Validator::not_empty(&self.user_id, "client.user_id"),
            Validator::in_range(
                self.request_timeout_secs,
                1,
                300,
                "client.request_timeout_secs",
            ),
            Validator::in_range(self.batch_size, 1, 100, "client.batch_size"),
            Validator::in_range(
                self.drain_interval_secs,
                5,
                86_400,
                "client.drain_interval_secs",
            ),
            Validator::in_range(self.debounce_ms, 0, 60_000, "client.debounce_ms"),
            Validator::in_range(
                self.probe_interval_secs,
                5,
                3_600,
                "client.probe_interval_secs",
            ),
        ];

        if self.queue_database.as_os_str().is_empty() {
            results.push(Err(ValidationError::new(
                "client.queue_database",
                "must not be empty",
            )));
        }

        for url in &self.probe_urls {
            results.push(Validator::http_url(url, "client.probe_urls"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.server_url = other.server_url;
        self.user_id = other.user_id;
        self.queue_database = other.queue_database;
        self.request_timeout_secs = other.request_timeout_secs;
        self.batch_size = other.batch_size;
        self.drain_interval_secs = other.drain_interval_secs;
        self.debounce_ms = other.debounce_ms;
        self.probe_interval_secs = other.probe_interval_secs;
        self.probe_urls = other.probe_urls;
    }

    fn section_name(&self) -> &'static str {
        "client"
    }
}
