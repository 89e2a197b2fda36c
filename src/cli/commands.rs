use crate::{
    cli::args::{SyncArgs, TokensArgs},
    console::ConsoleClient,
    core::{
        find_workspace_root, AppError, AppWorkspace, ConfigLoader, ConfigValidator,
        DefaultErrorReporter, DslSyncConfig, ErrorCategory, ErrorReporter,
    },
    credentials::{mask, CredentialManager, LevelDbExtractor},
    sync::SyncDriver,
    Result,
};
use std::env;
use std::path::{Path, PathBuf};

/// Resolved locations for one invocation.
struct Invocation {
    workspace_root: PathBuf,
    config: DslSyncConfig,
}

impl Invocation {
    /// Locate `dslsync.toml` (explicit, else nearest parent of `start`), load it
    /// with env overrides and validate. Without a config file the environment
    /// alone must supply the console URL.
    fn resolve(explicit: Option<&Path>, start: &Path) -> Result<Self> {
        let workspace_root = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_workspace_root(start).unwrap_or_else(|_| start.to_path_buf()),
        };
        let config = ConfigLoader::load_from_workspace(&workspace_root)?;
        ConfigValidator::validate(&config)?;
        tracing::debug!("Using workspace {}", workspace_root.display());
        Ok(Invocation {
            workspace_root,
            config,
        })
    }

    fn credential_manager(&self) -> CredentialManager {
        let extractor = LevelDbExtractor::from_config(&self.config.credentials);
        tracing::debug!("Credential store: {}", extractor.source_path().display());
        CredentialManager::from_config(
            Box::new(extractor),
            &self.config.credentials,
            &self.workspace_root,
        )
    }

    fn driver(&self) -> Result<SyncDriver> {
        let api_root = self.config.console.api_root().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                "console.base_url is required",
            )
        })?;
        let client = ConsoleClient::new(api_root, self.credential_manager());
        Ok(SyncDriver::new(client, self.config.guard.clone()))
    }
}

fn app_workspace(args: &SyncArgs) -> Result<AppWorkspace> {
    let app_dir = match &args.app_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir()?,
    };
    if !app_dir.is_dir() {
        return Err(AppError::new(
            ErrorCategory::ConfigurationError,
            format!("Application directory {} does not exist", app_dir.display()),
        )
        .into());
    }
    let workspace = AppWorkspace::new(app_dir);
    Ok(match &args.config {
        Some(config_file) => workspace.with_config_file(config_file),
        None => workspace,
    })
}

pub async fn export(args: SyncArgs) -> Result<()> {
    let app = app_workspace(&args)?;
    let invocation = Invocation::resolve(args.workspace.as_deref(), app.root())?;
    let mut driver = invocation.driver()?;

    let summary = driver.export(&app).await?;
    println!(
        "Exported {} ({})",
        summary.app_name.as_deref().unwrap_or("application"),
        summary.app_id
    );
    println!("  DSL: {}", app.dsl_file().display());
    println!(
        "  Prompts: {} nodes, {} turn files in {}",
        summary.split.prompt_nodes,
        summary.split.turn_files.len(),
        app.prompts_dir().display()
    );
    println!(
        "  Test inputs: {} variables, {} new placeholders",
        summary.split.inputs.inputs.len(),
        summary.split.inputs.created.len()
    );
    if summary.api_key_saved {
        println!("  Saved service API key to {}", app.config_file().display());
    }
    Ok(())
}

pub async fn update(args: SyncArgs) -> Result<()> {
    let app = app_workspace(&args)?;
    let invocation = Invocation::resolve(args.workspace.as_deref(), app.root())?;
    let mut driver = invocation.driver()?;

    let summary = driver.update(&app).await?;
    let reporter = DefaultErrorReporter::new();
    for warning in &summary.merge.warnings {
        reporter.report_warning(&warning.message, warning.context.get("node_id").cloned());
    }
    println!(
        "Updated {}: merged {} prompt nodes, skipped {}",
        summary.app_id,
        summary.merge.merged.len(),
        summary.merge.skipped()
    );
    println!("Published workflow for {}", summary.app_id);
    Ok(())
}

pub async fn tokens(args: TokensArgs) -> Result<()> {
    let start = env::current_dir()?;
    let invocation = Invocation::resolve(args.workspace.as_deref(), &start)?;
    let mut manager = invocation.credential_manager();

    if args.clear {
        manager.clear_cache()?;
        println!("Cleared credential cache {}", manager.cache_path().display());
        return Ok(());
    }

    let credential = manager.get_credential().ok_or_else(|| {
        AppError::new(
            ErrorCategory::CredentialError,
            "No console credential found in the cache or the browser store",
        )
        .with_suggestion("Log in to the console in Chrome, then rerun the command")
    })?;
    println!("Session token: {}", mask(credential.session_token()));
    println!("Refresh token: {}", mask(credential.refresh_token()));
    println!("Cache: {}", manager.cache_path().display());
    Ok(())
}
