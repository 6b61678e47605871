use crate::types::{CacheError, CredentialRecord};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Durable copy of the current credentials at a single file path
///
/// `load` and `save` never fail: a missing, unreadable or corrupt file is a
/// cache miss, and a failed write only loses the cache. The file may be
/// shared by several processes without locking; the last writer wins.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached record, `None` on any failure
    pub fn load(&self) -> Option<CredentialRecord> {
        match self.try_load() {
            Ok(record) => record,
            Err(CacheError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No credential cache at {}", self.path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Failed to load cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Read the cached record. An empty object `{}` is `Ok(None)`; a
    /// partially populated record is an error.
    pub fn try_load(&self) -> Result<Option<CredentialRecord>, CacheError> {
        let content = fs::read_to_string(&self.path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        if value.as_object().is_some_and(|fields| fields.is_empty()) {
            return Ok(None);
        }

        Ok(Some(serde_json::from_value(value)?))
    }

    /// Overwrite the cache with `record`, logging instead of failing
    pub fn save(&self, record: &CredentialRecord) {
        match self.try_save(record) {
            Ok(()) => tracing::debug!("Saved credentials to {}", self.path.display()),
            Err(e) => tracing::warn!("Failed to save cache {}: {}", self.path.display(), e),
        }
    }

    /// Overwrite the cache with `record`. The record is written to a temp
    /// file next to the cache and renamed over it, so readers see either the
    /// old or the new content. Missing parent directories are created; on
    /// Unix the file is readable by the owner only.
    pub fn try_save(&self, record: &CredentialRecord) -> Result<(), CacheError> {
        let content = serde_json::to_string(record)?;

        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(content.as_bytes())?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
