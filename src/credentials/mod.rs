//! Console session credentials: extraction from the browser's Local Storage
//! and the cache/refresh policy that wraps every authenticated request.

pub mod extractor;
pub mod manager;

pub use extractor::{default_leveldb_path, ExtractError, LevelDbExtractor};
pub use manager::{ConsoleResponse, CredentialManager, RequestSpec};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Session token plus refresh token, both non-empty and free of leading framing bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(alias = "API_TOKEN")]
    session_token: String,
    #[serde(alias = "API_REFRESH_TOKEN", default)]
    refresh_token: String,
}

impl Credential {
    /// Build a credential, returning `None` unless both tokens survive cleaning non-empty.
    pub fn new(session_token: &str, refresh_token: &str) -> Option<Self> {
        let session_token = strip_control_prefix(session_token).trim_end();
        let refresh_token = strip_control_prefix(refresh_token).trim_end();
        if session_token.is_empty() || refresh_token.is_empty() {
            return None;
        }
        Some(Credential {
            session_token: session_token.to_string(),
            refresh_token: refresh_token.to_string(),
        })
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Content hash of the session token, used to spot a refresh that changed nothing.
    pub fn fingerprint(&self) -> String {
        compute_sha256_hex(self.session_token.as_bytes())
    }

    /// Re-validate a record read from disk.
    fn sanitized(self) -> Option<Self> {
        Credential::new(&self.session_token, &self.refresh_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("session_token", &mask(&self.session_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .finish()
    }
}

/// Anything that can produce a fresh credential on demand.
pub trait CredentialSource: Send + Sync {
    fn extract(&self) -> Option<Credential>;
}

pub fn compute_sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Drop the non-printable framing bytes (0x00-0x1F) the browser store prefixes values with.
pub fn strip_control_prefix(value: &str) -> &str {
    value.trim_start_matches(|c: char| ('\u{0}'..='\u{1f}').contains(&c))
}

/// First ten characters followed by an ellipsis, for logs and terminal output.
pub fn mask(token: &str) -> String {
    let visible: String = token.chars().take(10).collect();
    if visible.len() < token.len() {
        format!("{}...", visible)
    } else {
        visible
    }
}
