use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Application directory holding config.json and the artifact set (default: current directory)
    #[arg(value_name = "APP_DIR")]
    pub app_dir: Option<PathBuf>,

    /// Alternate app config file, relative to the application directory (default: config.json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory containing dslsync.toml (default: nearest parent of APP_DIR that has one)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TokensArgs {
    /// Directory containing dslsync.toml (default: nearest parent of the current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Delete the cached credential instead of showing it
    #[arg(long)]
    pub clear: bool,
}
