//! On-disk credential store.
//!
//! Layout under the session directory:
//!
//! ```text
//! session/
//!   creds.json                  # primary credential blob
//! ```
//!
//! Writes go through a temp file in the same directory followed by a rename,
//! so a crash never leaves a half-written `creds.json` behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;

pub const DEFAULT_SESSION_DIR: &str = "session";
pub const CREDS_FILE: &str = "creds.json";

#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }

    pub fn exists(&self) -> bool {
        self.creds_path().is_file()
    }

    /// Overwrite `creds.json` with `bytes` verbatim.
    pub fn write_creds(&self, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.creds_path();
        self.write_atomic(&path, bytes)?;
        Ok(path)
    }

    pub fn read_creds(&self) -> Result<Option<Value>, StoreError> {
        self.read_json(&self.creds_path())
    }

    /// Persist updated credentials pushed by the messaging client.
    pub fn save_creds(&self, creds: &Value) -> Result<(), StoreError> {
        let path = self.creds_path();
        let data = serde_json::to_vec(creds).map_err(|e| StoreError::json(&path, e))?;
        self.write_atomic(&path, &data)
    }

    fn read_json(&self, path: &Path) -> Result<Option<Value>, StoreError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StoreError::json(path, e))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
        debug!(path = %path.display(), bytes = bytes.len(), "credential file written");
        Ok(())
    }
}
