#![allow(clippy::result_large_err)]

use super::{mask, Credential, CredentialSource};
use crate::core::config::CredentialsConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::utils::serialization::{FileSerializer, FileUtils, JsonSerializer};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// One outbound console call, replayable across retries.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        RequestSpec {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        RequestSpec {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// Successful console response with its body read to completion.
#[derive(Debug, Clone)]
pub struct ConsoleResponse {
    pub status: u16,
    pub body: String,
}

impl ConsoleResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_str(&self.body).map_err(|e| {
            AppError::with_source(
                ErrorCategory::SerializationError,
                "Console response is not the expected JSON",
                Box::new(e),
            )
        })
    }
}

/// Owns the session credential: memory copy, on-disk cache record and the
/// retry-on-401 policy for console requests.
pub struct CredentialManager {
    source: Box<dyn CredentialSource>,
    cache_path: PathBuf,
    http: reqwest::Client,
    cached: Option<Credential>,
    last_fingerprint: Option<String>,
    max_retries: u32,
    exchange_url: Option<String>,
    exchange_on_stale: bool,
}

impl CredentialManager {
    pub fn new(source: Box<dyn CredentialSource>, cache_path: impl Into<PathBuf>) -> Self {
        let defaults = CredentialsConfig::default();
        CredentialManager {
            source,
            cache_path: cache_path.into(),
            http: reqwest::Client::new(),
            cached: None,
            last_fingerprint: None,
            max_retries: defaults.max_retries,
            exchange_url: None,
            exchange_on_stale: defaults.exchange_on_stale,
        }
    }

    /// Build from the `[credentials]` section. A relative cache file resolves
    /// against the workspace root.
    pub fn from_config(
        source: Box<dyn CredentialSource>,
        config: &CredentialsConfig,
        workspace_root: &Path,
    ) -> Self {
        let cache_path = if config.cache_file.is_absolute() {
            config.cache_file.clone()
        } else {
            workspace_root.join(&config.cache_file)
        };
        CredentialManager::new(source, cache_path)
            .with_max_retries(config.max_retries)
            .with_exchange_on_stale(config.exchange_on_stale)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Endpoint for the refresh-token exchange, normally `{api root}/refresh-token`.
    pub fn with_exchange_url(mut self, url: impl Into<String>) -> Self {
        self.exchange_url = Some(url.into());
        self
    }

    pub fn with_exchange_on_stale(mut self, enabled: bool) -> Self {
        self.exchange_on_stale = enabled;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Memory first, then the disk record, then a fresh extraction.
    pub fn get_credential(&mut self) -> Option<Credential> {
        if let Some(credential) = &self.cached {
            return Some(credential.clone());
        }

        if let Some(credential) = self.load_cache_record() {
            tracing::debug!(
                "Loaded cached credential {}",
                mask(credential.session_token())
            );
            self.last_fingerprint = Some(credential.fingerprint());
            self.cached = Some(credential.clone());
            return Some(credential);
        }

        self.refresh()
    }

    /// Re-extract from the source. Returns `None` when nothing is found or when
    /// the extracted session token is the one that was already rejected.
    pub fn refresh(&mut self) -> Option<Credential> {
        tracing::info!("Refreshing console credential from the browser store");
        let Some(credential) = self.source.extract() else {
            tracing::warn!("No console credential found in the browser store");
            return None;
        };

        let fingerprint = credential.fingerprint();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            tracing::warn!(
                "Browser still holds the rejected session token; log in to the console in the browser and retry"
            );
            return None;
        }

        self.adopt(credential.clone());
        Some(credential)
    }

    /// Drop the in-memory credential. The last fingerprint is kept so that a
    /// subsequent refresh can tell whether the browser login actually changed.
    pub fn invalidate(&mut self) -> Option<Credential> {
        self.cached.take()
    }

    /// Forget everything, including the disk record.
    pub fn clear_cache(&mut self) -> Result<(), AppError> {
        self.cached = None;
        self.last_fingerprint = None;
        if self.cache_path.exists() {
            std::fs::remove_file(&self.cache_path)?;
            tracing::info!("Removed credential cache {}", self.cache_path.display());
        }
        Ok(())
    }

    pub async fn request_with_retry(
        &mut self,
        spec: &RequestSpec,
    ) -> Result<ConsoleResponse, AppError> {
        let budget = self.max_retries;
        self.request_with_budget(spec, budget).await
    }

    /// Send `spec` with the current bearer token. A 401 costs one retry: the
    /// credential is invalidated and re-extracted before the call is replayed.
    pub async fn request_with_budget(
        &mut self,
        spec: &RequestSpec,
        max_retries: u32,
    ) -> Result<ConsoleResponse, AppError> {
        let mut retries = 0;
        loop {
            let credential = self.get_credential().ok_or_else(|| {
                AppError::new(
                    ErrorCategory::CredentialError,
                    "No console credential available",
                )
                .with_suggestion("Log in to the console in Chrome, then rerun the command")
            })?;

            let response = self.send(spec, credential.session_token()).await?;
            if response.status == 401 {
                if retries >= max_retries {
                    return Err(AppError::new(
                        ErrorCategory::CredentialError,
                        format!(
                            "Console rejected the credential after {} retries: {} {}",
                            retries, spec.method, spec.url
                        ),
                    )
                    .with_suggestion("Log in to the console in Chrome again"));
                }
                retries += 1;
                tracing::warn!(
                    "Console returned 401 for {} {}, refreshing credential (retry {}/{})",
                    spec.method,
                    spec.url,
                    retries,
                    max_retries
                );
                self.invalidate();
                if self.refresh().is_some() {
                    continue;
                }
                if self.exchange_on_stale {
                    match self.exchange_refresh_token(credential.refresh_token()).await {
                        Ok(_) => continue,
                        Err(err) => tracing::warn!("Refresh-token exchange failed: {}", err),
                    }
                }
                return Err(AppError::new(
                    ErrorCategory::CredentialError,
                    "Credential refresh produced no new session token, please log in again",
                )
                .with_suggestion("Open the console in Chrome, sign in, then rerun the command"));
            }

            if !(200..300).contains(&response.status) {
                let mut error = AppError::new(
                    ErrorCategory::RemoteError,
                    format!(
                        "{} {} failed with HTTP {}: {}",
                        spec.method, spec.url, response.status, response.body
                    ),
                );
                error.add_context("status", &response.status.to_string());
                error.add_context("body", &response.body);
                return Err(error);
            }

            return Ok(response);
        }
    }

    /// Trade the refresh token for a new pair via the console's refresh endpoint.
    pub async fn exchange_refresh_token(
        &mut self,
        refresh_token: &str,
    ) -> Result<Credential, AppError> {
        let url = self.exchange_url.clone().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                "No refresh-token endpoint configured",
            )
        })?;

        tracing::info!("Exchanging refresh token at {}", url);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorCategory::RemoteError,
                    format!("POST {} failed", url),
                    Box::new(e),
                )
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::with_source(
                ErrorCategory::RemoteError,
                format!("Failed to read response body from {}", url),
                Box::new(e),
            )
        })?;
        if !status.is_success() {
            return Err(AppError::new(
                ErrorCategory::CredentialError,
                format!("Refresh-token exchange returned HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let value: Value = serde_json::from_str(&body)?;
        let pair = value.get("data").filter(|d| d.is_object()).unwrap_or(&value);
        let access = pair.get("access_token").and_then(Value::as_str).unwrap_or("");
        let refresh = pair.get("refresh_token").and_then(Value::as_str).unwrap_or("");
        let credential = Credential::new(access, refresh).ok_or_else(|| {
            AppError::new(
                ErrorCategory::CredentialError,
                "Refresh-token exchange returned an incomplete token pair",
            )
        })?;

        self.adopt(credential.clone());
        Ok(credential)
    }

    async fn send(&self, spec: &RequestSpec, token: &str) -> Result<ConsoleResponse, AppError> {
        tracing::debug!("{} {}", spec.method, spec.url);
        let mut request = self
            .http
            .request(spec.method.clone(), &spec.url)
            .bearer_auth(token);
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorCategory::RemoteError,
                format!("{} {} failed", spec.method, spec.url),
                Box::new(e),
            )
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            AppError::with_source(
                ErrorCategory::RemoteError,
                format!("Failed to read response body from {}", spec.url),
                Box::new(e),
            )
        })?;
        Ok(ConsoleResponse { status, body })
    }

    fn adopt(&mut self, credential: Credential) {
        self.last_fingerprint = Some(credential.fingerprint());
        if let Err(err) = FileUtils.save_to_file(&self.cache_path, &credential, &JsonSerializer) {
            tracing::warn!(
                "Failed to write credential cache {}: {}",
                self.cache_path.display(),
                err
            );
        }
        tracing::info!("Using console credential {}", mask(credential.session_token()));
        self.cached = Some(credential);
    }

    fn load_cache_record(&self) -> Option<Credential> {
        if !self.cache_path.exists() {
            return None;
        }
        match FileUtils.load_from_file::<Credential, _>(&self.cache_path, &JsonSerializer) {
            Ok(record) => record.sanitized(),
            Err(err) => {
                tracing::warn!(
                    "Ignoring unreadable credential cache {}: {}",
                    self.cache_path.display(),
                    err
                );
                None
            }
        }
    }
}
