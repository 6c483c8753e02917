// crates/network/src/intermediary.rs
//! Request routing between the application, the cache and the network
//!
//! Static resources are served cache-first with background revalidation.
//! Business API calls go to the network first and are never cached. Any
//! transport failure comes back as an offline marker response, so callers
//! always get a response object and never a raw transport error.

use crate::cache::ResourceCache;
use crate::client::Client;
use crate::connectivity::ConnectivityMonitor;
use crate::error::NetworkResult;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Method};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

/// Status code carried by synthesized offline responses
pub const OFFLINE_STATUS: u16 = 503;

const JSON_CONTENT_TYPE: &str = "application/json";

/// An outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: Method,
    /// Path relative to the server base, e.g. `/api/sync`
    pub path: String,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
}

impl ResourceRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            content_type: None,
        }
    }

    /// A POST carrying a JSON body
    pub fn post_json(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body.into()),
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
        }
    }

    /// Key under which the response is cached
    pub fn cache_key(&self) -> String {
        self.path.clone()
    }
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Synthesized because the network could not be reached
    Offline,
}

/// A response handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl ResourceResponse {
    /// A response received from the network
    pub fn network(status: u16, content_type: Option<String>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
            source: ResponseSource::Network,
        }
    }

    /// Synthesizes the offline marker
    pub fn offline(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Network is unavailable".to_string();
        }

        let marker = OfflineMarker {
            offline: true,
            error,
        };
        // Serializing a bool and a string cannot fail
        let body = serde_json::to_vec(&marker).unwrap_or_default();

        Self {
            status: OFFLINE_STATUS,
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            body: Bytes::from(body),
            source: ResponseSource::Offline,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_offline(&self) -> bool {
        self.source == ResponseSource::Offline
    }

    /// Decodes the offline marker, if this is one
    pub fn offline_marker(&self) -> Option<OfflineMarker> {
        if !self.is_offline() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Body of a synthesized offline response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineMarker {
    pub offline: bool,
    pub error: String,
}

/// Performs the actual network round trip
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the live response whatever its status; errors mean no response
    async fn fetch(&self, request: &ResourceRequest) -> NetworkResult<ResourceResponse>;
}

/// Fetcher backed by the HTTP client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> NetworkResult<ResourceResponse> {
        let url = self.url_for(&request.path);
        let response = self
            .client
            .send(
                request.method.clone(),
                &url,
                request.body.clone(),
                request.content_type.as_deref(),
            )
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(ResourceResponse::network(status, content_type, body))
    }
}

/// How a request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Cache-first
    Static,
    /// Network-first, never cached
    Api,
    /// Plain network call
    Passthrough,
}

/// Classifies requests by path prefix
#[derive(Debug, Clone, Default)]
pub struct RequestRouter {
    static_prefixes: Vec<String>,
    api_prefixes: Vec<String>,
}

impl RequestRouter {
    pub fn new(static_prefixes: Vec<String>, api_prefixes: Vec<String>) -> Self {
        Self {
            static_prefixes,
            api_prefixes,
        }
    }

    /// API prefixes are checked first so an overlapping static prefix
    /// can never cause a business response to be cached.
    pub fn classify(&self, path: &str) -> RequestClass {
        let path = path.split(['?', '#']).next().unwrap_or(path);

        if self.api_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            RequestClass::Api
        } else if self.static_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            RequestClass::Static
        } else {
            RequestClass::Passthrough
        }
    }
}

/// Sits between the application and the network
pub struct NetworkIntermediary {
    fetcher: Arc<dyn Fetcher>,
    cache: ResourceCache,
    router: RequestRouter,
    monitor: Option<ConnectivityMonitor>,
    revalidations: Mutex<JoinSet<()>>,
}

impl NetworkIntermediary {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: ResourceCache, router: RequestRouter) -> Self {
        Self {
            fetcher,
            cache,
            router,
            monitor: None,
            revalidations: Mutex::new(JoinSet::new()),
        }
    }

    /// Consults the monitor before touching the network
    pub fn with_monitor(mut self, monitor: ConnectivityMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    fn is_online(&self) -> bool {
        self.monitor.as_ref().map_or(true, |m| m.is_online())
    }

    /// Handles one request; never fails
    pub async fn handle(&self, request: ResourceRequest) -> ResourceResponse {
        let class = self.router.classify(&request.path);
        log::debug!("{} {} routed as {:?}", request.method, request.path, class);

        match class {
            RequestClass::Static if request.method == Method::GET => {
                self.handle_static(request).await
            }
            _ => self.handle_network_first(&request).await,
        }
    }

    async fn handle_static(&self, request: ResourceRequest) -> ResourceResponse {
        let key = request.cache_key();

        let cached = match self.cache.lookup(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                log::warn!("Cache lookup for {} failed: {}", key, e);
                None
            }
        };

        if let Some(cached) = cached {
            if self.is_online() {
                self.spawn_revalidation(request);
            }
            return cached;
        }

        if !self.is_online() {
            return ResourceResponse::offline(format!("{} is not cached", request.path));
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if let Err(e) = self.cache.store(&key, &response).await {
                    log::warn!("Failed to cache {}: {}", key, e);
                }
                response
            }
            Err(e) => {
                log::info!("Static fetch of {} failed: {}", request.path, e);
                ResourceResponse::offline(e.to_string())
            }
        }
    }

    async fn handle_network_first(&self, request: &ResourceRequest) -> ResourceResponse {
        if !self.is_online() {
            return ResourceResponse::offline("Network is unavailable");
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                log::info!("{} {} failed: {}", request.method, request.path, e);
                ResourceResponse::offline(e.to_string())
            }
        }
    }

    fn spawn_revalidation(&self, request: ResourceRequest) {
        let fetcher = Arc::clone(&self.fetcher);
        let cache = self.cache.clone();

        let mut tasks = self.revalidations.lock().unwrap_or_else(|e| e.into_inner());
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let key = request.cache_key();
            match fetcher.fetch(&request).await {
                Ok(response) => match cache.store(&key, &response).await {
                    Ok(true) => log::debug!("Revalidated {}", key),
                    Ok(false) => log::debug!("Revalidation of {} returned {}", key, response.status),
                    Err(e) => log::warn!("Failed to store revalidated {}: {}", key, e),
                },
                Err(e) => log::debug!("Revalidation of {} failed: {}", key, e),
            }
        });
    }

    /// Waits for in-flight background revalidations
    pub async fn settle(&self) {
        let mut tasks = {
            let mut guard = self.revalidations.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        while tasks.join_next().await.is_some() {}
    }
}

impl std::fmt::Debug for NetworkIntermediary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkIntermediary")
            .field("cache", &self.cache)
            .field("router", &self.router)
            .field("online", &self.is_online())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteCacheStorage;
    use crate::connectivity::ConnectivityStatus;
    use crate::error::NetworkError;
    use ledgerline_database::{connect_in_memory, run_migrations};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers every path with its own name and a version counter
    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        down: AtomicBool,
        status: AtomicUsize,
    }

    impl FakeFetcher {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, request: &ResourceRequest) -> NetworkResult<ResourceResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.down.load(Ordering::SeqCst) {
                return Err(NetworkError::NetworkUnavailable("connection refused".into()));
            }
            let status = match self.status.load(Ordering::SeqCst) {
                0 => 200,
                s => s as u16,
            };
            Ok(ResourceResponse::network(
                status,
                Some("text/plain".to_string()),
                Bytes::from(format!("{} #{}", request.path, n)),
            ))
        }
    }

    async fn setup(fetcher: Arc<FakeFetcher>) -> NetworkIntermediary {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let cache = ResourceCache::new(Arc::new(SqliteCacheStorage::new(pool)), "app", "v1");
        let router = RequestRouter::new(vec!["/static/".into()], vec!["/api/".into()]);
        NetworkIntermediary::new(fetcher, cache, router)
    }

    fn offline_monitor() -> ConnectivityMonitor {
        ConnectivityMonitor::new(ConnectivityStatus::Offline, Duration::from_millis(10))
    }

    #[test]
    fn test_router_classification() {
        let router = RequestRouter::new(
            vec!["/static/".into(), "/".into()],
            vec!["/api/".into()],
        );
        assert_eq!(router.classify("/static/app.css"), RequestClass::Static);
        assert_eq!(router.classify("/api/sync"), RequestClass::Api);
        assert_eq!(router.classify("/api/sync?x=1"), RequestClass::Api);

        let narrow = RequestRouter::new(vec!["/static/".into()], vec!["/api/".into()]);
        assert_eq!(narrow.classify("/healthz"), RequestClass::Passthrough);
    }

    #[test]
    fn test_offline_marker_shape() {
        let response = ResourceResponse::offline("");
        let json: serde_json::Value = serde_json::from_slice(&response.body).unwrap();

        assert_eq!(response.status, OFFLINE_STATUS);
        assert_eq!(json["offline"], true);
        assert!(!json["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_is_cached_then_revalidated() {
        let fetcher = Arc::new(FakeFetcher::default());
        let intermediary = setup(fetcher.clone()).await;

        let first = intermediary.handle(ResourceRequest::get("/static/app.js")).await;
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(first.body, Bytes::from("/static/app.js #1"));

        let second = intermediary.handle(ResourceRequest::get("/static/app.js")).await;
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.body, Bytes::from("/static/app.js #1"));

        intermediary.settle().await;
        assert_eq!(fetcher.calls(), 2);

        let cached = intermediary.cache().lookup("/static/app.js").await.unwrap().unwrap();
        assert_eq!(cached.body, Bytes::from("/static/app.js #2"));
    }

    #[tokio::test]
    async fn test_static_served_from_cache_while_offline() {
        let fetcher = Arc::new(FakeFetcher::default());
        let intermediary = setup(fetcher.clone()).await.with_monitor(offline_monitor());

        let cached = ResourceResponse::network(200, None, Bytes::from_static(b"saved"));
        intermediary.cache().store("/static/app.js", &cached).await.unwrap();

        let response = intermediary.handle(ResourceRequest::get("/static/app.js")).await;
        assert_eq!(response.body, Bytes::from_static(b"saved"));
        assert_eq!(fetcher.calls(), 0);

        let miss = intermediary.handle(ResourceRequest::get("/static/other.js")).await;
        assert!(miss.is_offline());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_error_status_is_not_cached() {
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.status.store(404, Ordering::SeqCst);
        let intermediary = setup(fetcher.clone()).await;

        let response = intermediary.handle(ResourceRequest::get("/static/gone.js")).await;
        assert_eq!(response.status, 404);
        assert!(intermediary.cache().lookup("/static/gone.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_is_never_cached() {
        let fetcher = Arc::new(FakeFetcher::default());
        let intermediary = setup(fetcher.clone()).await;

        let request = ResourceRequest::post_json("/api/sync", Bytes::from_static(b"{}"));
        intermediary.handle(request.clone()).await;
        let second = intermediary.handle(request).await;

        assert_eq!(second.source, ResponseSource::Network);
        assert_eq!(fetcher.calls(), 2);
        assert!(intermediary.cache().lookup("/api/sync").await.unwrap().is_none());

        intermediary.handle(ResourceRequest::get("/api/records")).await;
        assert!(intermediary.cache().lookup("/api/records").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_error_status_is_returned_as_is() {
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.status.store(500, Ordering::SeqCst);
        let intermediary = setup(fetcher).await;

        let response = intermediary.handle(ResourceRequest::get("/api/records")).await;
        assert_eq!(response.status, 500);
        assert!(!response.is_offline());
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_offline_marker() {
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.down.store(true, Ordering::SeqCst);
        let intermediary = setup(fetcher).await;

        for path in ["/api/sync", "/healthz", "/static/app.js"] {
            let response = intermediary.handle(ResourceRequest::get(path)).await;
            let marker = response.offline_marker().unwrap();
            assert!(marker.offline);
            assert!(!marker.error.is_empty());
        }
    }

    #[tokio::test]
    async fn test_api_skips_network_when_monitor_is_offline() {
        let fetcher = Arc::new(FakeFetcher::default());
        let intermediary = setup(fetcher.clone()).await.with_monitor(offline_monitor());

        let response = intermediary.handle(ResourceRequest::get("/api/records")).await;
        assert!(response.is_offline());
        assert_eq!(fetcher.calls(), 0);
    }
}
