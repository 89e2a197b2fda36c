//! Export and update pipelines between the console and an application's artifact set.
#![allow(clippy::result_large_err)]

use crate::console::ConsoleClient;
use crate::core::config::{AppConfig, GuardConfig};
use crate::core::error::AppError;
use crate::core::types::{ErrorCategory, SyncStage};
use crate::core::workspace::AppWorkspace;
use crate::dsl::{self, MergeReport, SplitReport};
use crate::utils::serialization::FileUtils;
use std::fs;

/// Result of a completed export.
#[derive(Debug)]
pub struct ExportSummary {
    pub app_id: String,
    pub app_name: Option<String>,
    pub split: SplitReport,
    /// Set when this run fetched and stored a service API key.
    pub api_key_saved: bool,
}

/// Result of a completed update.
#[derive(Debug)]
pub struct UpdateSummary {
    pub app_id: String,
    pub merge: MergeReport,
    pub import_result: serde_json::Value,
    pub publish_result: serde_json::Value,
}

/// Drives one application through export or update, tracking the current stage.
pub struct SyncDriver {
    client: ConsoleClient,
    guard: GuardConfig,
    stage: SyncStage,
}

impl SyncDriver {
    pub fn new(client: ConsoleClient, guard: GuardConfig) -> Self {
        SyncDriver {
            client,
            guard,
            stage: SyncStage::Idle,
        }
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub fn client_mut(&mut self) -> &mut ConsoleClient {
        &mut self.client
    }

    fn enter(&mut self, stage: SyncStage) {
        tracing::info!(from = %self.stage, to = %stage, "sync stage");
        self.stage = stage;
    }

    fn finish<T>(&mut self, result: Result<T, AppError>) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                self.enter(SyncStage::Idle);
                Ok(value)
            }
            Err(mut error) => {
                error.add_context("stage", &self.stage.to_string());
                tracing::error!(stage = %self.stage, "sync failed: {}", error.message);
                self.stage = SyncStage::Failed;
                Err(error)
            }
        }
    }

    /// Reject applications whose folder carries a protected environment tag.
    pub fn check_guard(&self, workspace: &AppWorkspace) -> Result<(), AppError> {
        match workspace.tag(&self.guard.protected_tags) {
            Some(tag) => {
                let mut error = AppError::new(
                    ErrorCategory::GuardError,
                    format!(
                        "Refusing to update '{}': applications tagged {} are protected",
                        workspace.folder_name(),
                        tag
                    ),
                )
                .with_suggestion("Update the protected application from the console instead");
                error.add_context("app_dir", &workspace.root().display().to_string());
                Err(error)
            }
            None => Ok(()),
        }
    }

    /// Authenticate, fetch the document, write `DSL/main.yml` and split it.
    pub async fn export(&mut self, workspace: &AppWorkspace) -> Result<ExportSummary, AppError> {
        let result = self.run_export(workspace).await;
        self.finish(result)
    }

    async fn run_export(&mut self, workspace: &AppWorkspace) -> Result<ExportSummary, AppError> {
        let mut app_config = AppConfig::load(workspace.config_file())?;
        let app_id = app_config.require_app_id()?.to_string();

        self.enter(SyncStage::Authenticating);
        self.client.authenticate()?;

        self.enter(SyncStage::Fetching);
        let text = self.client.export_dsl(&app_id).await?;
        let document = dsl::decode(&text)?;
        let dsl_file = workspace.dsl_file();
        FileUtils::write_text(&dsl_file, &text).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to write {}: {}", dsl_file.display(), e),
            )
        })?;
        tracing::info!("Saved DSL document to {}", dsl_file.display());

        let mut api_key_saved = false;
        if app_config.test_api_key.trim().is_empty() {
            match self.client.api_keys(&app_id).await {
                Ok(keys) => match keys.into_iter().next() {
                    Some(token) => {
                        app_config.test_api_key = token;
                        app_config.save(workspace.config_file())?;
                        api_key_saved = true;
                        tracing::info!("Stored service API key in {}", workspace.config_file().display());
                    }
                    None => tracing::warn!("Application {} has no service API keys", app_id),
                },
                Err(err) => tracing::warn!("Could not fetch service API keys: {}", err),
            }
        }

        self.enter(SyncStage::Splitting);
        let split = dsl::split(&document, workspace)?;

        Ok(ExportSummary {
            app_name: document.app_name().map(str::to_string),
            app_id,
            split,
            api_key_saved,
        })
    }

    /// Merge the artifacts into `DSL/main.yml`, upload it and publish the workflow.
    pub async fn update(&mut self, workspace: &AppWorkspace) -> Result<UpdateSummary, AppError> {
        if let Err(error) = self.check_guard(workspace) {
            tracing::error!("{}", error.message);
            return Err(error);
        }
        let result = self.run_update(workspace).await;
        self.finish(result)
    }

    async fn run_update(&mut self, workspace: &AppWorkspace) -> Result<UpdateSummary, AppError> {
        let app_config = AppConfig::load(workspace.config_file())?;
        let app_id = app_config.require_app_id()?.to_string();

        self.enter(SyncStage::Merging);
        let dsl_file = workspace.dsl_file();
        let text = fs::read_to_string(&dsl_file).map_err(|e| {
            AppError::with_source(
                ErrorCategory::IoError,
                format!("Failed to read {}", dsl_file.display()),
                Box::new(e),
            )
            .with_suggestion("Run `dslsync export` first to fetch the DSL document")
        })?;
        let document = dsl::decode(&text)?;
        let (merged, merge) = dsl::merge(document, workspace)?;
        let yaml = dsl::encode(&merged)?;
        FileUtils::write_text(&dsl_file, &yaml).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to write {}: {}", dsl_file.display(), e),
            )
        })?;

        self.enter(SyncStage::Uploading);
        let import_result = self.client.import_dsl(&app_id, &yaml).await?;
        tracing::info!("Uploaded DSL document for {}", app_id);

        self.enter(SyncStage::Publishing);
        let publish_result = self.client.publish(&app_id).await?;
        tracing::info!("Published workflow for {}", app_id);

        Ok(UpdateSummary {
            app_id,
            merge,
            import_result,
            publish_result,
        })
    }
}
