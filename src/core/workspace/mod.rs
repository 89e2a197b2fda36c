#![allow(clippy::result_large_err)]

use crate::core::config::{app::APP_CONFIG_FILE, CONFIG_FILE_NAME};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Input set that receives generated placeholder files.
pub const DEFAULT_INPUT_SET: &str = "1";

/// Directory contract for one application's artifact set.
#[derive(Debug, Clone)]
pub struct AppWorkspace {
    root: PathBuf,
    config_file: PathBuf,
}

impl AppWorkspace {
    /// `root` is resolved to an absolute path without `.` or `..`, so the
    /// folder name (and its environment tag) is known even for `dslsync update .`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = resolve_dir(root.into());
        let config_file = root.join(APP_CONFIG_FILE);
        AppWorkspace { root, config_file }
    }

    /// Use an alternate app config file; relative paths resolve against the app directory.
    pub fn with_config_file(mut self, config_file: &Path) -> Self {
        self.config_file = if config_file.is_absolute() {
            config_file.to_path_buf()
        } else {
            self.root.join(config_file)
        };
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn dsl_file(&self) -> PathBuf {
        self.root.join("DSL").join("main.yml")
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.root.join("prompts")
    }

    pub fn test_dir(&self) -> PathBuf {
        self.root.join("test")
    }

    pub fn inputs_file(&self) -> PathBuf {
        self.test_dir().join("inputs.json")
    }

    pub fn input_set_dir(&self) -> PathBuf {
        self.test_dir().join("inputs").join(DEFAULT_INPUT_SET)
    }

    /// Folder name, which follows `<name>-<TAG>-<app id>` for synced applications.
    pub fn folder_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Environment tag embedded in the folder name, if any of `tags` appears as `-<TAG>-`.
    pub fn tag<'a>(&self, tags: &'a [String]) -> Option<&'a str> {
        let folder = self.folder_name();
        tags.iter()
            .map(String::as_str)
            .find(|tag| folder.contains(&format!("-{}-", tag)))
    }

    pub fn is_protected(&self, protected_tags: &[String]) -> bool {
        self.tag(protected_tags).is_some()
    }
}

/// Canonical form of `dir`; lexical normalization against the current
/// directory when the path cannot be canonicalized.
fn resolve_dir(dir: PathBuf) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(&dir) {
        return resolved;
    }
    let absolute = if dir.is_absolute() {
        dir
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(dir),
            Err(_) => dir,
        }
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Walk up from `current_dir` until a directory holding `dslsync.toml` is found.
pub fn find_workspace_root(current_dir: &Path) -> Result<PathBuf, AppError> {
    let mut path = current_dir.to_path_buf();
    loop {
        if path.join(CONFIG_FILE_NAME).is_file() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            path = parent.to_path_buf();
        } else {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                format!(
                    "No {} found in {} or any parent directory",
                    CONFIG_FILE_NAME,
                    current_dir.display()
                ),
            )
            .with_suggestion("Pass --workspace or create dslsync.toml in the project root"));
        }
    }
}
