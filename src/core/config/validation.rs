#![allow(clippy::result_large_err)]

use super::DslSyncConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &DslSyncConfig) -> Result<(), AppError> {
        let base_url = config
            .console
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::new(
                    ErrorCategory::ConfigurationError,
                    "console.base_url is required",
                )
                .with_suggestion("Create dslsync.toml with a [console] base_url entry")
            })?;

        let parsed = Url::parse(base_url).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("console.base_url is not a valid URL: {}", e),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                "console.base_url must use http or https",
            ));
        }

        let credentials = &config.credentials;
        for (name, value) in [
            ("credentials.origin_marker", &credentials.origin_marker),
            ("credentials.session_marker", &credentials.session_marker),
            ("credentials.refresh_marker", &credentials.refresh_marker),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ConfigurationError,
                    format!("{} cannot be empty", name),
                ));
            }
        }

        if credentials.cache_file.as_os_str().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                "credentials.cache_file cannot be empty",
            ));
        }

        Ok(())
    }
}
