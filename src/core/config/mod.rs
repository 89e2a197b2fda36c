use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod app;
pub mod loader;
pub mod validation;

pub use app::{AppConfig, KeyStyle};
pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

/// File name of the workspace configuration searched for by `find_workspace_root`.
pub const CONFIG_FILE_NAME: &str = "dslsync.toml";

/// Main configuration loaded from dslsync.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DslSyncConfig {
    /// Remote console endpoints
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Browser credential extraction and caching
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Update safety guard
    #[serde(default)]
    pub guard: GuardConfig,
}

/// Console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Origin of the console, e.g. https://cloud.dify.ai
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path prefix prepended to every console API route
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

/// Credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Browser Local Storage LevelDB directory (platform default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leveldb_path: Option<PathBuf>,

    /// Text that a storage key must contain to belong to the console
    #[serde(default = "default_origin_marker")]
    pub origin_marker: String,

    /// Key marker for the session token
    #[serde(default = "default_session_marker")]
    pub session_marker: String,

    /// Key marker for the refresh token
    #[serde(default = "default_refresh_marker")]
    pub refresh_marker: String,

    /// Credential cache record, relative to the workspace root
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,

    /// Authorization rejections tolerated per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exchange the refresh token when the browser session looks stale
    #[serde(default)]
    pub exchange_on_stale: bool,
}

/// Guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Application tags that forbid `update`
    #[serde(default = "default_protected_tags")]
    pub protected_tags: Vec<String>,
}

// Default functions
fn default_api_prefix() -> String {
    "/console/api".to_string()
}

fn default_origin_marker() -> String {
    "cloud.dify.ai".to_string()
}

fn default_session_marker() -> String {
    "console_token".to_string()
}

fn default_refresh_marker() -> String {
    "refresh_token".to_string()
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(".token_cache.json")
}

fn default_max_retries() -> u32 {
    2
}

fn default_protected_tags() -> Vec<String> {
    vec!["PRODUCTION".to_string()]
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            base_url: None,
            api_prefix: default_api_prefix(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            leveldb_path: None,
            origin_marker: default_origin_marker(),
            session_marker: default_session_marker(),
            refresh_marker: default_refresh_marker(),
            cache_file: default_cache_file(),
            max_retries: default_max_retries(),
            exchange_on_stale: false,
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            protected_tags: default_protected_tags(),
        }
    }
}

impl ConsoleConfig {
    /// Base URL joined with the API prefix, without a trailing slash.
    pub fn api_root(&self) -> Option<String> {
        let base = self.base_url.as_deref()?.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            Some(base.to_string())
        } else {
            Some(format!("{}/{}", base, prefix))
        }
    }
}
