#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::utils::serialization::{FileSerializer, FileUtils, JsonSerializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;
use std::path::Path;

/// Default per-application config file, relative to the application directory.
pub const APP_CONFIG_FILE: &str = "config.json";

/// Spelling of the id and key entries, kept so a rewrite lands where other
/// tools reading the file look.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStyle {
    #[default]
    Snake,
    /// `APP_ID` / `TEST_API_KEY`
    Upper,
}

/// Per-application settings kept next to the artifact set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Console identifier of the application
    #[serde(default, alias = "APP_ID")]
    pub app_id: String,

    /// Service API key used by test runners; filled in by `export` when empty
    #[serde(default, alias = "TEST_API_KEY")]
    pub test_api_key: String,

    /// Entries this tool does not interpret, written back as found
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    pub key_style: KeyStyle,
}

impl AppConfig {
    /// Read the app config. A missing or unparseable file is a configuration error.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                format!("App config not found: {}", path.display()),
            )
            .with_suggestion("Create config.json with an app_id entry in the application directory"));
        }

        let raw: Value = FileUtils
            .load_from_file(path, &JsonSerializer)
            .map_err(|e| parse_error(path, e))?;
        let key_style = if raw.get("APP_ID").is_some() || raw.get("TEST_API_KEY").is_some() {
            KeyStyle::Upper
        } else {
            KeyStyle::Snake
        };
        let mut config: AppConfig =
            serde_json::from_value(raw).map_err(|e| parse_error(path, e))?;
        config.key_style = key_style;
        Ok(config)
    }

    /// Write the config back using the key spelling it was read with.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let (id_key, api_key) = match self.key_style {
            KeyStyle::Snake => ("app_id", "test_api_key"),
            KeyStyle::Upper => ("APP_ID", "TEST_API_KEY"),
        };
        let mut record = self.extra.clone();
        record.insert(id_key.to_string(), Value::from(self.app_id.as_str()));
        record.insert(api_key.to_string(), Value::from(self.test_api_key.as_str()));

        FileUtils
            .save_to_file(path, &record, &JsonSerializer)
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::IoError,
                    format!("Failed to write app config {}: {}", path.display(), e),
                )
            })
    }

    /// Ensure the app id is usable before any network call.
    pub fn require_app_id(&self) -> Result<&str, AppError> {
        let app_id = self.app_id.trim();
        if app_id.is_empty() {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                "app_id is empty in the app config",
            ));
        }
        Ok(app_id)
    }
}

fn parse_error(path: &Path, error: impl Display) -> AppError {
    AppError::new(
        ErrorCategory::ConfigurationError,
        format!("Failed to parse app config {}: {}", path.display(), error),
    )
}
