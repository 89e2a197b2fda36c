#![allow(clippy::result_large_err)]

use super::{DslSyncConfig, CONFIG_FILE_NAME};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from workspace root (workspace/dslsync.toml)
    /// Environment variables override config file values
    pub fn load_from_workspace(workspace_path: &Path) -> Result<DslSyncConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        Self::load_with_overrides(&config_path)
    }

    /// Load config from an explicit file and apply environment overrides.
    /// A missing file yields defaults, which validation rejects unless the
    /// environment supplies the console base URL.
    pub fn load_with_overrides(path: &Path) -> Result<DslSyncConfig, AppError> {
        let config_file = Self::load_from_file(path)?;
        if config_file.is_none() {
            tracing::debug!("No config file at {}, using defaults", path.display());
        }

        let mut config = config_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<DslSyncConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: DslSyncConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(config: &mut DslSyncConfig) {
        if let Ok(base_url) = env::var("DSLSYNC_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.console.base_url = Some(base_url);
            }
        }

        if let Ok(api_prefix) = env::var("DSLSYNC_API_PREFIX") {
            config.console.api_prefix = api_prefix;
        }

        if let Ok(leveldb_path) = env::var("DSLSYNC_LEVELDB_PATH") {
            config.credentials.leveldb_path = Some(PathBuf::from(leveldb_path));
        }

        if let Ok(origin_marker) = env::var("DSLSYNC_ORIGIN_MARKER") {
            config.credentials.origin_marker = origin_marker;
        }

        if let Ok(cache_file) = env::var("DSLSYNC_CACHE_FILE") {
            config.credentials.cache_file = PathBuf::from(cache_file);
        }

        if let Ok(max_retries_str) = env::var("DSLSYNC_MAX_RETRIES") {
            if let Ok(max_retries) = max_retries_str.parse::<u32>() {
                config.credentials.max_retries = max_retries;
            }
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "DSLSYNC_BASE_URL - Override console base URL",
            "DSLSYNC_API_PREFIX - Override console API prefix (default: /console/api)",
            "DSLSYNC_LEVELDB_PATH - Override browser Local Storage LevelDB directory",
            "DSLSYNC_ORIGIN_MARKER - Override storage key origin marker (default: cloud.dify.ai)",
            "DSLSYNC_CACHE_FILE - Override credential cache file (default: .token_cache.json)",
            "DSLSYNC_MAX_RETRIES - Override authorization retry budget (default: 2)",
        ]
    }
}
