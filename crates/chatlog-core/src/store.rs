//! Durable, key-addressed storage of whole log documents.
//!
//! A document is written as a single unit: readers observe either the
//! previous content or the new content, never a partial write.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use crate::error::{ChatLogError, Result};

/// Key-addressed document storage.
pub trait LogStore: Send + Sync {
    /// Read the document stored under `name`, or `None` if it does not exist.
    fn read_document(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the document stored under `name` with `data`.
    fn write_document(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Human-readable location of `name`, used in diagnostics.
    fn location(&self, name: &str) -> String;
}

/// Filesystem-backed store: one file per document inside a namespace directory.
///
/// Layout: `<log_dir>/<name>`
#[derive(Debug, Clone)]
pub struct FsLogStore {
    log_dir: PathBuf,
}

impl FsLogStore {
    /// Create a store rooted at `log_dir`, creating the directory if needed.
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir)
            .map_err(|e| ChatLogError::io(log_dir.display().to_string(), e))?;
        Ok(Self { log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn document_path(&self, name: &str) -> PathBuf {
        self.log_dir.join(name)
    }
}

impl LogStore for FsLogStore {
    fn read_document(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if !self.log_dir.is_dir() {
            // Namespace removed underneath us: bring it back empty.
            fs::create_dir_all(&self.log_dir)
                .map_err(|e| ChatLogError::io(self.log_dir.display().to_string(), e))?;
            return Ok(None);
        }

        let path = self.document_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChatLogError::io(path.display().to_string(), e)),
        }
    }

    fn write_document(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.document_path(name);
        let io_err = |e: std::io::Error| ChatLogError::io(path.display().to_string(), e);

        // Atomic write: temp file in the same directory, then rename over the target.
        let mut tmp = NamedTempFile::new_in(&self.log_dir).map_err(io_err)?;
        tmp.write_all(data).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        self.document_path(name).display().to_string()
    }
}

/// In-memory store backed by a `HashMap<name, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored documents, sorted.
    pub fn document_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogStore for MemoryLogStore {
    fn read_document(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().get(name).cloned())
    }

    fn write_document(&self, name: &str, data: &[u8]) -> Result<()> {
        self.lock().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        format!("memory://{name}")
    }
}
