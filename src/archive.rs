//! Append-only JSON archive of fetched repository records.
//!
//! The archive is a single pretty-printed JSON array, oldest record first. Every
//! append reads the whole file, pushes the new record and writes the whole file
//! back through a temporary file that is renamed over the archive, so a reader
//! never observes a half-written file. Without `serialize_writes` nothing guards
//! the cycle itself: two appends that overlap both start from the same contents
//! and the later write drops the earlier record.

use crate::record::RepoRecord;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read archive {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize archive: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write archive {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct Archive {
    path: PathBuf,
    write_lock: Option<Mutex<()>>,
}

impl Archive {
    /// An archive whose appends race each other.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: None,
        }
    }

    /// An archive whose appends are serialized through one lock.
    pub fn serialized(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Some(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record, oldest first.
    ///
    /// A missing or unparsable file reads as empty. Only other I/O failures are errors.
    pub async fn load(&self) -> Result<Vec<RepoRecord>, ArchiveError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Archive not found, starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ArchiveError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Archive is not a record array, treating as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Reads every record, newest first.
    pub async fn load_newest_first(&self) -> Result<Vec<RepoRecord>, ArchiveError> {
        let mut records = self.load().await?;
        records.reverse();
        Ok(records)
    }

    /// Appends `record` at the end of the archive and returns the new length.
    pub async fn append(&self, record: RepoRecord) -> Result<usize, ArchiveError> {
        let _guard = match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let mut records = self.load().await?;
        records.push(record);
        let len = records.len();

        let mut body = serde_json::to_vec_pretty(&records)?;
        body.push(b'\n');

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        let write_error = |source| ArchiveError::Write {
            path: self.path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&dir).await.map_err(write_error)?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&dir, &path, &body))
            .await
            .map_err(std::io::Error::other)
            .and_then(|result| result)
            .map_err(write_error)?;

        tracing::debug!(path = %self.path.display(), records = len, "Archive written");
        Ok(len)
    }
}

/// Writes `body` to a temporary file next to `path` and renames it into place,
/// so readers see either the previous archive or the new one, never a partial file.
fn replace_file(dir: &Path, path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
