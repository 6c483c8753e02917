//! Client resource cache configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Request routing and cache naming for the network intermediary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix shared by every cache this client owns
    pub cache_prefix: String,

    /// Live deployment version; caches for other versions are evicted
    pub version: String,

    /// Path prefixes served cache-first
    pub static_prefixes: Vec<String>,

    /// Path prefixes served network-first and never cached
    pub api_prefixes: Vec<String>,

    /// Static resources fetched into the cache on install
    pub precache: Vec<String>,
}

impl CacheConfig {
    /// Name of the live cache, `<prefix>-<version>`
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "ledgerline".to_string(),
            version: "v1".to_string(),
            static_prefixes: vec!["/static/".to_string(), "/assets/".to_string()],
            api_prefixes: vec!["/api/".to_string()],
            precache: vec!["/".to_string()],
        }
    }
}

impl ConfigSection for CacheConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::not_empty(&self.cache_prefix, "cache.cache_prefix"),
            Validator::not_empty(&self.version, "cache.version"),
        ];

        if self.cache_prefix.contains('-') {
            results.push(Err(ValidationError::with_value(
                "cache.cache_prefix",
                "must not contain '-'",
                &self.cache_prefix,
            )));
        }

        for prefix in &self.static_prefixes {
            results.push(Validator::path_prefix(prefix, "cache.static_prefixes"));
        }
        for prefix in &self.api_prefixes {
            results.push(Validator::path_prefix(prefix, "cache.api_prefixes"));
            if self.static_prefixes.contains(prefix) {
                results.push(Err(ValidationError::with_value(
                    "cache.api_prefixes",
                    "is also listed as a static prefix",
                    prefix,
                )));
            }
        }
        for path in &self.precache {
            results.push(Validator::path_prefix(path, "cache.precache"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.cache_prefix = other.cache_prefix;
        self.version = other.version;
        self.static_prefixes = other.static_prefixes;
        self.api_prefixes = other.api_prefixes;
        self.precache = other.precache;
    }

    fn section_name(&self) -> &'static str {
        "cache"
    }
}
