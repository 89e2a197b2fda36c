use dslsync::core::config::{ConfigLoader, ConfigValidator, CONFIG_FILE_NAME};
use dslsync::core::ErrorCategory;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_dslsync_env() {
    for v in &[
        "DSLSYNC_BASE_URL",
        "DSLSYNC_API_PREFIX",
        "DSLSYNC_LEVELDB_PATH",
        "DSLSYNC_ORIGIN_MARKER",
        "DSLSYNC_CACHE_FILE",
        "DSLSYNC_MAX_RETRIES",
    ] {
        env::remove_var(v);
    }
}

/// Full config file plus env overrides, then validation.
#[test]
#[serial]
fn test_config_loading_integration() {
    clear_dslsync_env();
    let temp_dir = TempDir::new().unwrap();
    let workspace_path = temp_dir.path();

    let config_content = r#"
[console]
base_url = "https://dify.internal.example"
api_prefix = "/console/api"

[credentials]
leveldb_path = "/profiles/work/Local Storage/leveldb"
origin_marker = "dify.internal.example"
cache_file = "state/tokens.json"
max_retries = 3
exchange_on_stale = true

[guard]
protected_tags = ["PRODUCTION", "PROD"]

[logging]
default_level = "debug"
"#;
    fs::write(workspace_path.join(CONFIG_FILE_NAME), config_content).unwrap();

    env::set_var("DSLSYNC_MAX_RETRIES", "5");
    env::set_var("DSLSYNC_ORIGIN_MARKER", "dify.override.example");
    let config = ConfigLoader::load_from_workspace(workspace_path).unwrap();
    clear_dslsync_env();

    ConfigValidator::validate(&config).unwrap();
    assert_eq!(
        config.console.api_root().as_deref(),
        Some("https://dify.internal.example/console/api")
    );
    assert_eq!(
        config.credentials.leveldb_path,
        Some(PathBuf::from("/profiles/work/Local Storage/leveldb"))
    );
    assert_eq!(config.credentials.origin_marker, "dify.override.example");
    assert_eq!(config.credentials.cache_file, PathBuf::from("state/tokens.json"));
    assert_eq!(config.credentials.max_retries, 5);
    assert!(config.credentials.exchange_on_stale);
    assert_eq!(config.guard.protected_tags, vec!["PRODUCTION", "PROD"]);
}

#[test]
#[serial]
fn test_missing_config_file_fails_validation() {
    clear_dslsync_env();
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    let error = ConfigValidator::validate(&config).unwrap_err();
    assert_eq!(error.category, ErrorCategory::ConfigurationError);
    assert!(!error.recovery_suggestions.is_empty());
}

#[test]
#[serial]
fn test_env_alone_can_supply_base_url() {
    clear_dslsync_env();
    let temp_dir = TempDir::new().unwrap();

    env::set_var("DSLSYNC_BASE_URL", "http://localhost:5001/");
    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_dslsync_env();

    ConfigValidator::validate(&config).unwrap();
    assert_eq!(
        config.console.api_root().as_deref(),
        Some("http://localhost:5001/console/api")
    );
    assert_eq!(config.credentials.max_retries, 2);
    assert_eq!(config.credentials.origin_marker, "cloud.dify.ai");
    assert!(!config.credentials.exchange_on_stale);
}

#[test]
#[serial]
fn test_malformed_config_is_configuration_error() {
    clear_dslsync_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "[console\nbase_url = 1").unwrap();

    let error = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(error.category, ErrorCategory::ConfigurationError);
}

#[test]
#[serial]
fn test_non_http_base_url_is_rejected() {
    clear_dslsync_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(CONFIG_FILE_NAME),
        "[console]\nbase_url = \"ftp://files.example\"\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert!(ConfigValidator::validate(&config).is_err());
}
