//! Locates the config file and layers environment overrides on top of it

use crate::{persistence, Config, ConfigError, ConfigResult, LogLevel};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Entry point used by `ledgerline` and `ledgerline-server`
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Uses the platform's per-user config directory
    ///
    /// `~/.config/ledgerline/` on Linux,
    /// `~/Library/Application Support/ledgerline/` on macOS.
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "ledgerline").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_directory(dirs.config_dir()))
    }

    pub fn with_directory(config_dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_dir.as_ref().join(CONFIG_FILE),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The file's settings, or the defaults when there is no file
    pub fn load(&self) -> ConfigResult<Config> {
        persistence::read(&self.config_path)
    }

    /// Writes a default config file; returns false if one already exists
    pub fn initialize(&self) -> ConfigResult<bool> {
        let created = persistence::create(&self.config_path, &Config::default())?;
        if !created {
            log::info!("Config already exists at {}", self.config_path.display());
        }
        Ok(created)
    }

    /// Loads the file and applies `LEDGERLINE_*` environment variables
    ///
    /// - `LEDGERLINE_SERVER_URL` -> `client.server_url`
    /// - `LEDGERLINE_USER_ID` -> `client.user_id`
    /// - `LEDGERLINE_BIND_ADDRESS` -> `server.bind_address`
    /// - `LEDGERLINE_DATABASE` -> `server.database_path`
    /// - `LEDGERLINE_LOG_LEVEL` -> `app.log_level`
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }
}

pub(crate) fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("LEDGERLINE_SERVER_URL") {
        log::debug!("client.server_url overridden from environment");
        config.client.server_url = url;
    }

    if let Some(user) = lookup("LEDGERLINE_USER_ID") {
        config.client.user_id = user;
    }

    if let Some(addr) = lookup("LEDGERLINE_BIND_ADDRESS") {
        log::debug!("server.bind_address overridden from environment");
        config.server.bind_address = addr;
    }

    if let Some(path) = lookup("LEDGERLINE_DATABASE") {
        config.server.database_path = PathBuf::from(path);
    }

    if let Some(level) = lookup("LEDGERLINE_LOG_LEVEL") {
        match level.parse::<LogLevel>() {
            Ok(level) => config.app.log_level = level,
            Err(e) => log::warn!("Ignoring LEDGERLINE_LOG_LEVEL: {}", e),
        }
    }
}
