use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    ConfigurationError,
    CredentialError,
    RemoteError,
    ArtifactError,
    GuardError,
    SerializationError,
    IoError,
    InternalError,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
    Debug,
}

/// Stages of an export or update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncStage {
    #[default]
    Idle,
    Authenticating,
    Fetching,
    Splitting,
    Merging,
    Uploading,
    Publishing,
    Failed,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStage::Idle => "idle",
            SyncStage::Authenticating => "authenticating",
            SyncStage::Fetching => "fetching",
            SyncStage::Splitting => "splitting",
            SyncStage::Merging => "merging",
            SyncStage::Uploading => "uploading",
            SyncStage::Publishing => "publishing",
            SyncStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
