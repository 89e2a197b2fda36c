pub mod cli;
pub mod console;
pub mod core;
pub mod credentials;
pub mod dsl;
pub mod logging;
pub mod sync;
pub mod utils;

/// Current crate version string exposed for CLI and tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Result<T> = std::result::Result<T, anyhow::Error>;
