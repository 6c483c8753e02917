//! Integration tests for the configuration system

use ledgerline_config::{
    AppConfig, CacheConfig, ClientConfig, Config, ConfigManager, ConfigSection, ServerConfig,
    CONFIG_VERSION,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path());
    Ok((temp_dir, manager))
}

#[test]
fn test_init_then_hand_edit() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    assert!(manager.initialize()?);
    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let edited = fs::read_to_string(manager.config_path())?
        .replace("http://127.0.0.1:8080", "https://ledger.example.com")
        .replace("version = \"v1\"", "version = \"v2\"");
    fs::write(manager.config_path(), edited)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.client.server_url, "https://ledger.example.com");
    assert_eq!(reloaded.cache.cache_name(), "ledgerline-v2");

    // A second init leaves the edit alone
    assert!(!manager.initialize()?);
    assert_eq!(manager.load()?, reloaded);
    Ok(())
}

#[test]
fn test_all_sections_default_are_valid() {
    assert!(AppConfig::default().validate().is_ok());
    assert!(ClientConfig::default().validate().is_ok());
    assert!(ServerConfig::default().validate().is_ok());
    assert!(CacheConfig::default().validate().is_ok());
}

#[test]
fn test_section_names() {
    assert_eq!(AppConfig::default().section_name(), "app");
    assert_eq!(ClientConfig::default().section_name(), "client");
    assert_eq!(ServerConfig::default().section_name(), "server");
    assert_eq!(CacheConfig::default().section_name(), "cache");
}

#[test]
fn test_unreadable_file_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    fs::write(manager.config_path(), "client = [[[")?;

    assert!(manager.load().is_err());
    assert!(manager.load_with_env_overrides().is_err());
    Ok(())
}

#[test]
fn test_file_layout_is_sectioned_toml() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let contents = fs::read_to_string(manager.config_path())?;
    assert!(contents.contains("[client]"));
    assert!(contents.contains("[server]"));
    assert!(contents.contains("[cache]"));
    assert!(contents.contains("batch_size = 5"));
    Ok(())
}

#[test]
fn test_database_paths_follow_data_dir() -> Result<(), Box<dyn std::error::Error>> {
    let (temp_dir, manager) = setup_test_manager()?;
    let data_dir = temp_dir.path().join("data");
    fs::write(
        manager.config_path(),
        format!("[app]\ndata_dir = {:?}\n", data_dir.to_string_lossy()),
    )?;

    let config = manager.load()?;
    assert_eq!(config.queue_database_path(), data_dir.join("client.db"));
    assert_eq!(config.server_database_path(), data_dir.join("server.db"));
    Ok(())
}

#[test]
fn test_multiple_validation_errors_collected() {
    let mut config = Config::default();
    config.client.batch_size = 0;
    config.server.bind_address = "???".to_string();
    config.cache.static_prefixes = vec!["static".to_string()];
    config.app.data_dir = PathBuf::new();

    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 4);
}
