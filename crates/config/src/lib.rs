//! Ledgerline Configuration System
//!
//! Settings for the offline client, the reconciliation server and the
//! client's resource cache, stored as one TOML file.
//!
//! # Architecture
//!
//! - **Trait-based**: each section implements `ConfigSection`
//! - **Graceful degradation**: invalid files on load only produce warnings
//! - **Create-only writes**: `config init` never replaces an existing file
//! - **Override chain**: defaults < file < `LEDGERLINE_*` environment variables
//!
//! # Example
//!
//! ```rust,no_run
//! use ledgerline_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("config directory");
//! let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Syncing to {}", config.client.server_url);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
mod cache_config;
mod client_config;
mod server_config;

pub use error::{ConfigError, ConfigResult};
pub use manager::ConfigManager;
pub use validation::{ConfigSection, ValidationError, Validator};

// Re-export config sections
pub use app_config::{AppConfig, LogLevel};
pub use cache_config::CacheConfig;
pub use client_config::ClientConfig;
pub use server_config::ServerConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Offline client: queue, dispatcher and connectivity
    pub client: ClientConfig,

    /// Reconciliation server
    pub server: ServerConfig,

    /// Client resource cache and request routing
    pub cache: CacheConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.client.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.server.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.cache.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.client.merge(other.client);
        self.server.merge(other.server);
        self.cache.merge(other.cache);
    }

    /// Resolves a possibly relative path against `app.data_dir`
    pub fn resolve_data_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app.data_dir.join(path)
        }
    }

    /// Location of the client's queue database
    pub fn queue_database_path(&self) -> PathBuf {
        self.resolve_data_path(&self.client.queue_database)
    }

    /// Location of the server's authoritative database
    pub fn server_database_path(&self) -> PathBuf {
        self.resolve_data_path(&self.server.database_path)
    }

    /// Renders the config the way it is written to disk
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(ConfigError::Render)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            client: ClientConfig::default(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_rendering_round_trips() {
        let config = Config::default();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("[client]"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_version_is_set() {
        let config = Config::default();
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        let mut override_config = Config::default();
        override_config.client.batch_size = 10;

        base.merge(override_config);
        assert_eq!(base.client.batch_size, 10);
    }

    #[test]
    fn test_relative_paths_resolve_under_data_dir() {
        let mut config = Config::default();
        config.app.data_dir = PathBuf::from("/var/lib/ledgerline");
        config.client.queue_database = PathBuf::from("queue.db");
        config.server.database_path = PathBuf::from("/srv/ledger.db");

        assert_eq!(
            config.queue_database_path(),
            PathBuf::from("/var/lib/ledgerline/queue.db")
        );
        assert_eq!(config.server_database_path(), PathBuf::from("/srv/ledger.db"));
    }
}
