// FILE: crates/cli/src/context.rs

use anyhow::{bail, Context, Result};
use ledgerline_config::Config;
use ledgerline_network::{
    Client, ClientConfig as HttpClientConfig, ConnectivityChecker, ConnectivityMonitor,
    ConnectivityStatus, Fetcher, HttpFetcher, NetworkIntermediary, RequestRouter, ResourceCache,
    SqliteCacheStorage,
};
use ledgerline_sync_engine::{DispatcherConfig, HttpTransport, SqliteOperationQueue, SyncClient};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command needs to talk to the local queue and the server
pub struct ClientContext {
    pub config: Config,
    pub queue_path: PathBuf,
    pub client: SyncClient,
    pub monitor: ConnectivityMonitor,
    pub checker: ConnectivityChecker,
    pub fetcher: Arc<dyn Fetcher>,
    pub intermediary: Arc<NetworkIntermediary>,
}

impl ClientContext {
    /// Opens the queue database and wires the client stack from `config`
    ///
    /// The monitor starts from a single probe so one-shot commands see the
    /// current state without waiting out the debounce.
    pub async fn open(config: Config) -> Result<Self> {
        if config.client.user_id.trim().is_empty() {
            bail!("client.user_id is not set; pass --user or set LEDGERLINE_USER_ID");
        }

        let queue_path = config.queue_database_path();
        if let Some(parent) = queue_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let queue = SqliteOperationQueue::open(&queue_path)
            .await
            .with_context(|| format!("Failed to open {}", queue_path.display()))?;

        let http = Client::with_config(HttpClientConfig::with_timeout(
            config.client.request_timeout(),
        ))
        .context("Failed to build the HTTP client")?;

        let checker = ConnectivityChecker::new(http.clone(), config.client.effective_probe_urls());
        let initial = if checker.is_online().await {
            ConnectivityStatus::Online
        } else {
            ConnectivityStatus::Offline
        };
        log::debug!("Starting {:?}", initial);
        let monitor = ConnectivityMonitor::new(initial, config.client.debounce());

        let fetcher: Arc<dyn Fetcher> =
            Arc::new(HttpFetcher::new(http, config.client.server_url.clone()));
        let cache = ResourceCache::new(
            Arc::new(SqliteCacheStorage::new(queue.pool().clone())),
            config.cache.cache_prefix.clone(),
            config.cache.version.clone(),
        );
        let router = RequestRouter::new(
            config.cache.static_prefixes.clone(),
            config.cache.api_prefixes.clone(),
        );
        let intermediary = Arc::new(
            NetworkIntermediary::new(fetcher.clone(), cache, router).with_monitor(monitor.clone()),
        );

        let dispatcher_config = DispatcherConfig {
            user_id: config.client.user_id.clone(),
            batch_size: config.client.batch_size,
            request_timeout: config.client.request_timeout(),
            drain_interval: config.client.drain_interval(),
            ..DispatcherConfig::default()
        };
        let client = SyncClient::new(
            Arc::new(queue),
            Arc::new(HttpTransport::new(intermediary.clone())),
            monitor.clone(),
            dispatcher_config,
        );

        Ok(Self {
            config,
            queue_path,
            client,
            monitor,
            checker,
            fetcher,
            intermediary,
        })
    }
}
