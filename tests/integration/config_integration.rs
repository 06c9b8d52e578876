//! Configuration loading through files and the environment.

use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;
use vantage::config::{ConfigLoader, VantageConfig};
use vantage::{ContentService, ResolveError};

/// Tests that touch process environment run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_load_full_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("vantage.toml");
    fs::write(
        &path,
        r#"
[store]
project_id = "abc123"
dataset = "staging"
api_version = "v2023-05-03"
token = "sk-secret"
timeout_ms = 2500

[cache]
enabled = false
ttl_secs = 5
max_entries = 10

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.store.project_id, "abc123");
    assert_eq!(config.store.dataset, "staging");
    assert_eq!(config.store.timeout_ms, 2500);
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.max_entries, 10);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
    assert!(config.validate().is_ok());

    let shown = config.to_toml().unwrap();
    assert!(!shown.contains("sk-secret"));
    assert!(shown.contains("abc123"));
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("vantage.toml");
    fs::write(&path, "[store]\nproject_id = \"abc123\"\n").unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let defaults = VantageConfig::default();
    assert_eq!(config.store.dataset, defaults.store.dataset);
    assert_eq!(config.store.api_version, defaults.store.api_version);
    assert_eq!(config.cache.ttl_secs, defaults.cache.ttl_secs);
    assert_eq!(config.logging.level, defaults.logging.level);
}

#[test]
fn test_missing_explicit_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::load(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ResolveError::ConfigError(_)));
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("vantage.toml");
    fs::write(&path, "[store\nproject_id = ").unwrap();
    assert!(matches!(
        ConfigLoader::load_from_file(&path),
        Err(ResolveError::ConfigError(_))
    ));
}

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("vantage.toml");
    fs::write(&path, "[store]\nproject_id = \"abc123\"\ndataset = \"staging\"\n").unwrap();

    std::env::set_var("VANTAGE_STORE__DATASET", "production-eu");
    std::env::set_var("VANTAGE_CACHE__TTL_SECS", "7");
    let loaded = ConfigLoader::load(Some(&path));
    std::env::remove_var("VANTAGE_STORE__DATASET");
    std::env::remove_var("VANTAGE_CACHE__TTL_SECS");

    let config = loaded.unwrap();
    assert_eq!(config.store.project_id, "abc123");
    assert_eq!(config.store.dataset, "production-eu");
    assert_eq!(config.cache.ttl_secs, 7);
}

#[test]
fn test_service_requires_valid_config() {
    let err = ContentService::from_config(&VantageConfig::default()).err().unwrap();
    assert!(matches!(err, ResolveError::ConfigError(_)));

    let mut config = VantageConfig::default();
    config.store.project_id = "abc123".to_string();
    let service = ContentService::from_config(&config).unwrap();
    assert!(service.cache().is_some());

    config.cache.enabled = false;
    let service = ContentService::from_config(&config).unwrap();
    assert!(service.cache().is_none());
}
