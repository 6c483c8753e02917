// crates/network/src/cache.rs
//! Versioned resource caches
//!
//! Caches are named `<prefix>-<version>`. Activating a version deletes every
//! other cache carrying the same prefix, so a deployment change is a full
//! reset rather than an incremental patch.

use crate::error::NetworkResult;
use crate::intermediary::{Fetcher, ResourceRequest, ResourceResponse, ResponseSource};
use async_trait::async_trait;
use bytes::Bytes;
use ledgerline_core::Timestamp;
use ledgerline_database::queries::cache as cache_queries;
use ledgerline_database::queries::CacheEntry;
use ledgerline_database::DbPool;
use std::sync::Arc;

/// Persistent storage behind the resource cache
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn get(&self, cache: &str, key: &str) -> NetworkResult<Option<ResourceResponse>>;
    async fn put(&self, cache: &str, key: &str, response: &ResourceResponse) -> NetworkResult<()>;
    /// Deletes a cache, returning true if it held anything
    async fn delete_cache(&self, cache: &str) -> NetworkResult<bool>;
    async fn cache_names(&self) -> NetworkResult<Vec<String>>;
}

/// SQLite-backed cache storage
#[derive(Debug, Clone)]
pub struct SqliteCacheStorage {
    pool: DbPool,
}

impl SqliteCacheStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn get(&self, cache: &str, key: &str) -> NetworkResult<Option<ResourceResponse>> {
        let entry = cache_queries::get_cache_entry(&self.pool, cache, key).await?;
        Ok(entry.map(|e| ResourceResponse {
            status: e.status,
            content_type: e.content_type,
            body: Bytes::from(e.body),
            source: ResponseSource::Cache,
        }))
    }

    async fn put(&self, cache: &str, key: &str, response: &ResourceResponse) -> NetworkResult<()> {
        let entry = CacheEntry {
            status: response.status,
            content_type: response.content_type.clone(),
            body: response.body.to_vec(),
            stored_at: Timestamp::now(),
        };
        cache_queries::put_cache_entry(&self.pool, cache, key, &entry).await?;
        Ok(())
    }

    async fn delete_cache(&self, cache: &str) -> NetworkResult<bool> {
        Ok(cache_queries::delete_cache(&self.pool, cache).await? > 0)
    }

    async fn cache_names(&self) -> NetworkResult<Vec<String>> {
        Ok(cache_queries::list_cache_names(&self.pool).await?)
    }
}

/// The live cache for one deployment version
#[derive(Clone)]
pub struct ResourceCache {
    storage: Arc<dyn CacheStorage>,
    prefix: String,
    version: String,
}

impl ResourceCache {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        prefix: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    /// Name of the live cache
    pub fn name(&self) -> String {
        format!("{}-{}", self.prefix, self.version)
    }

    /// Looks up a resource in the live cache
    pub async fn lookup(&self, key: &str) -> NetworkResult<Option<ResourceResponse>> {
        self.storage.get(&self.name(), key).await
    }

    /// Stores a resource if it is a success response
    ///
    /// Returns whether it was stored.
    pub async fn store(&self, key: &str, response: &ResourceResponse) -> NetworkResult<bool> {
        if !response.is_success() {
            return Ok(false);
        }
        self.storage.put(&self.name(), key, response).await?;
        Ok(true)
    }

    /// Deletes every cache with this prefix except the live one
    ///
    /// Returns the names of the deleted caches.
    pub async fn activate(&self) -> NetworkResult<Vec<String>> {
        let live = self.name();
        let family = format!("{}-", self.prefix);
        let mut deleted = Vec::new();

        for name in self.storage.cache_names().await? {
            if name.starts_with(&family) && name != live {
                self.storage.delete_cache(&name).await?;
                log::info!("Evicted stale cache {}", name);
                deleted.push(name);
            }
        }

        Ok(deleted)
    }

    /// Fetches and stores a list of static resources into the live cache
    ///
    /// Resources that fail to download are logged and skipped; returns how
    /// many were cached.
    pub async fn install(&self, fetcher: &dyn Fetcher, paths: &[String]) -> NetworkResult<usize> {
        let mut cached = 0;

        for path in paths {
            let request = ResourceRequest::get(path.clone());
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    self.store(&request.cache_key(), &response).await?;
                    cached += 1;
                }
                Ok(response) => {
                    log::warn!("Precache of {} returned HTTP {}", path, response.status);
                }
                Err(e) => {
                    log::warn!("Precache of {} failed: {}", path, e);
                }
            }
        }

        log::info!("Installed {}/{} resources into {}", cached, paths.len(), self.name());
        Ok(cached)
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use ledgerline_database::{connect_in_memory, run_migrations};

    async fn storage() -> Arc<dyn CacheStorage> {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteCacheStorage::new(pool))
    }

    struct StaticFetcher;

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, request: &ResourceRequest) -> NetworkResult<ResourceResponse> {
            match request.path.as_str() {
                "/missing" => Ok(ResourceResponse::network(404, None, Bytes::new())),
                "/down" => Err(NetworkError::Timeout),
                path => Ok(ResourceResponse::network(
                    200,
                    Some("text/plain".to_string()),
                    Bytes::from(format!("body of {}", path)),
                )),
            }
        }
    }

    #[tokio::test]
    async fn test_store_only_success_responses() {
        let cache = ResourceCache::new(storage().await, "app", "v1");

        let ok = ResourceResponse::network(200, None, Bytes::from_static(b"ok"));
        let missing = ResourceResponse::network(404, None, Bytes::new());

        assert!(cache.store("/a", &ok).await.unwrap());
        assert!(!cache.store("/b", &missing).await.unwrap());

        let hit = cache.lookup("/a").await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"ok"));
        assert_eq!(hit.source, ResponseSource::Cache);
        assert!(cache.lookup("/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activate_evicts_other_versions() {
        let storage = storage().await;
        let body = ResourceResponse::network(200, None, Bytes::from_static(b"x"));

        for version in ["v1", "v2", "v3"] {
            ResourceCache::new(storage.clone(), "app", version)
                .store("/a", &body)
                .await
                .unwrap();
        }
        storage.put("other-v1", "/a", &body).await.unwrap();

        let live = ResourceCache::new(storage.clone(), "app", "v3");
        let mut deleted = live.activate().await.unwrap();
        deleted.sort();

        assert_eq!(deleted, vec!["app-v1".to_string(), "app-v2".to_string()]);
        assert_eq!(
            storage.cache_names().await.unwrap(),
            vec!["app-v3".to_string(), "other-v1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_install_skips_failures() {
        let cache = ResourceCache::new(storage().await, "app", "v1");
        let paths = vec![
            "/".to_string(),
            "/missing".to_string(),
            "/down".to_string(),
            "/static/app.js".to_string(),
        ];

        assert_eq!(cache.install(&StaticFetcher, &paths).await.unwrap(), 2);
        assert!(cache.lookup("/static/app.js").await.unwrap().is_some());
        assert!(cache.lookup("/missing").await.unwrap().is_none());
    }
}
