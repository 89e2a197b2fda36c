pub mod config;
pub mod error;
pub mod types;
pub mod workspace;

pub use config::{AppConfig, ConfigLoader, ConfigValidator, DslSyncConfig};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter};
pub use types::*;
pub use workspace::{find_workspace_root, AppWorkspace};
