//! Typed wrappers for the console endpoints the sync driver consumes. Every
//! call goes through the credential manager's retry policy.
#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::credentials::{Credential, CredentialManager, RequestSpec};
use serde::Deserialize;
use serde_json::{json, Value};

/// Console API client rooted at `<base_url><api_prefix>`.
pub struct ConsoleClient {
    api_root: String,
    credentials: CredentialManager,
}

#[derive(Debug, Deserialize)]
struct ApiKeyList {
    #[serde(default)]
    data: Vec<ApiKey>,
}

#[derive(Debug, Deserialize)]
struct ApiKey {
    #[serde(default)]
    token: String,
}

impl ConsoleClient {
    pub fn new(api_root: impl Into<String>, credentials: CredentialManager) -> Self {
        let api_root = api_root.into().trim_end_matches('/').to_string();
        let credentials = credentials.with_exchange_url(format!("{}/refresh-token", api_root));
        ConsoleClient {
            api_root,
            credentials,
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub fn credentials_mut(&mut self) -> &mut CredentialManager {
        &mut self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }

    /// Make sure a credential is available before the first request.
    pub fn authenticate(&mut self) -> Result<Credential, AppError> {
        self.credentials.get_credential().ok_or_else(|| {
            AppError::new(
                ErrorCategory::CredentialError,
                "No console credential found in the browser store",
            )
            .with_suggestion("Log in to the console in Chrome, then rerun the command")
            .with_suggestion("Set credentials.leveldb_path if Chrome uses a non-default profile")
        })
    }

    /// Document text of `app_id`, unwrapped from `{"data": ...}` when the console wraps it.
    pub async fn export_dsl(&mut self, app_id: &str) -> Result<String, AppError> {
        let spec = RequestSpec::get(self.url(&format!(
            "apps/{}/export?include_secret=false",
            app_id
        )));
        let response = self.credentials.request_with_retry(&spec).await?;
        Ok(unwrap_export_body(response.body))
    }

    /// Tokens of the application's service API keys, in console order.
    pub async fn api_keys(&mut self, app_id: &str) -> Result<Vec<String>, AppError> {
        let spec = RequestSpec::get(self.url(&format!("apps/{}/api-keys", app_id)));
        let response = self.credentials.request_with_retry(&spec).await?;
        let keys: ApiKeyList = response.json()?;
        Ok(keys
            .data
            .into_iter()
            .map(|key| key.token)
            .filter(|token| !token.is_empty())
            .collect())
    }

    pub async fn import_dsl(&mut self, app_id: &str, yaml_content: &str) -> Result<Value, AppError> {
        let spec = RequestSpec::post(
            self.url("apps/imports"),
            json!({
                "mode": "yaml-content",
                "yaml_content": yaml_content,
                "app_id": app_id,
            }),
        );
        let response = self.credentials.request_with_retry(&spec).await?;
        let result: Value = response
            .json()
            .unwrap_or_else(|_| Value::String(response.body.clone()));
        if result.get("status").and_then(Value::as_str) == Some("failed") {
            let detail = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no detail given");
            return Err(AppError::new(
                ErrorCategory::RemoteError,
                format!("Console rejected the import: {}", detail),
            ));
        }
        Ok(result)
    }

    pub async fn publish(&mut self, app_id: &str) -> Result<Value, AppError> {
        let spec = RequestSpec::post(
            self.url(&format!("apps/{}/workflows/publish", app_id)),
            json!({ "marked_name": "", "marked_comment": "" }),
        );
        let response = self.credentials.request_with_retry(&spec).await?;
        Ok(response
            .json()
            .unwrap_or_else(|_| Value::String(response.body.clone())))
    }
}

fn unwrap_export_body(body: String) -> String {
    if !body.trim_start().starts_with('{') {
        return body;
    }
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(mut object)) => match object.remove("data") {
            Some(Value::String(text)) => text,
            _ => body,
        },
        _ => body,
    }
}
