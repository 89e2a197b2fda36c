use super::{Credential, CredentialSource};
use crate::core::config::CredentialsConfig;
use rusty_leveldb::{LdbIterator, Options, DB};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

/// Reasons an extraction attempt produced no credential. Callers only see `None`;
/// these exist for debug logging.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("credential store {0} does not exist")]
    SourceMissing(PathBuf),
    #[error("failed to snapshot credential store: {0}")]
    Snapshot(#[from] io::Error),
    #[error("failed to open credential store snapshot: {0}")]
    Open(String),
    #[error("no {0} entry for the console origin")]
    MarkerMissing(&'static str),
}

/// Reads console tokens out of a Chromium Local Storage LevelDB directory.
///
/// The live directory is locked by the browser while it runs, so every
/// extraction works on a private copy that is removed before returning.
#[derive(Debug, Clone)]
pub struct LevelDbExtractor {
    source_path: PathBuf,
    origin_marker: String,
    session_marker: String,
    refresh_marker: String,
    scratch_root: Option<PathBuf>,
}

impl LevelDbExtractor {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let defaults = CredentialsConfig::default();
        LevelDbExtractor {
            source_path: source_path.into(),
            origin_marker: defaults.origin_marker,
            session_marker: defaults.session_marker,
            refresh_marker: defaults.refresh_marker,
            scratch_root: None,
        }
    }

    /// Configured path when it exists, otherwise the platform default profile.
    pub fn from_config(config: &CredentialsConfig) -> Self {
        let source_path = match &config.leveldb_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                tracing::warn!(
                    "Configured LevelDB path {} does not exist, falling back to the default profile",
                    path.display()
                );
                default_leveldb_path()
            }
            None => default_leveldb_path(),
        };
        LevelDbExtractor {
            source_path,
            origin_marker: config.origin_marker.clone(),
            session_marker: config.session_marker.clone(),
            refresh_marker: config.refresh_marker.clone(),
            scratch_root: None,
        }
    }

    pub fn with_origin_marker(mut self, marker: impl Into<String>) -> Self {
        self.origin_marker = marker.into();
        self
    }

    /// Place snapshots under `root` instead of the system temp directory.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn try_extract(&self) -> Result<Credential, ExtractError> {
        if !self.source_path.is_dir() {
            return Err(ExtractError::SourceMissing(self.source_path.clone()));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("dslsync-leveldb-");
        let scratch = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let (session, refresh) = self.read_snapshot(&scratch)?;
        if let Err(err) = scratch.close() {
            tracing::warn!("Failed to remove credential store snapshot: {}", err);
        }

        let session = session.ok_or(ExtractError::MarkerMissing("session token"))?;
        let refresh = refresh.ok_or(ExtractError::MarkerMissing("refresh token"))?;
        Credential::new(&session, &refresh).ok_or(ExtractError::MarkerMissing("non-empty token"))
    }

    fn read_snapshot(
        &self,
        scratch: &TempDir,
    ) -> Result<(Option<String>, Option<String>), ExtractError> {
        copy_store(&self.source_path, scratch.path())?;

        let mut options = Options::default();
        options.create_if_missing = false;
        let mut db =
            DB::open(scratch.path(), options).map_err(|e| ExtractError::Open(e.to_string()))?;
        let mut iter = db
            .new_iter()
            .map_err(|e| ExtractError::Open(e.to_string()))?;

        let mut session = None;
        let mut refresh = None;
        let (mut key, mut value) = (Vec::new(), Vec::new());
        while iter.advance() {
            if !iter.current(&mut key, &mut value) {
                continue;
            }
            let key_text = String::from_utf8_lossy(&key);
            if !key_text.contains(self.origin_marker.as_str()) {
                continue;
            }
            if key_text.contains(self.session_marker.as_str()) {
                session = Some(decode_value(&value));
            }
            if key_text.contains(self.refresh_marker.as_str()) {
                refresh = Some(decode_value(&value));
            }
        }
        drop(iter);
        drop(db);

        Ok((session, refresh))
    }
}

impl CredentialSource for LevelDbExtractor {
    fn extract(&self) -> Option<Credential> {
        match self.try_extract() {
            Ok(credential) => Some(credential),
            Err(err) => {
                tracing::debug!(
                    "Credential extraction from {} failed: {}",
                    self.source_path.display(),
                    err
                );
                None
            }
        }
    }
}

/// Chrome's Local Storage location for the default profile on this platform.
pub fn default_leveldb_path() -> PathBuf {
    let profile = if cfg!(target_os = "macos") {
        dirs_next::home_dir()
            .unwrap_or_default()
            .join("Library/Application Support/Google/Chrome/Default")
    } else if cfg!(target_os = "windows") {
        dirs_next::data_local_dir()
            .unwrap_or_default()
            .join("Google/Chrome/User Data/Default")
    } else {
        dirs_next::config_dir()
            .unwrap_or_default()
            .join("google-chrome/Default")
    };
    profile.join("Local Storage").join("leveldb")
}

/// Copy the store's files into `target`. The browser's LOCK file is left behind.
fn copy_store(source: &Path, target: &Path) -> io::Result<()> {
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() || entry.file_name() == "LOCK" {
            continue;
        }
        fs::copy(entry.path(), target.join(entry.file_name()))?;
    }
    Ok(())
}

/// Local Storage values carry a one-byte encoding prefix: 0x00 marks UTF-16LE,
/// 0x01 marks Latin-1. Unprefixed values are read as UTF-8.
fn decode_value(raw: &[u8]) -> String {
    match raw.split_first() {
        Some((0, rest)) => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        Some((1, rest)) => rest.iter().map(|&byte| char::from(byte)).collect(),
        _ => String::from_utf8_lossy(raw).into_owned(),
    }
}
