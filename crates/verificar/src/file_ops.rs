//! Filesystem collaborator.
//!
//! Fixtures are read and artifacts are written through [`FileStore`], so the
//! comparator can run against the local disk or an in-memory store in tests.

use crate::result::{VerificarError, VerificarResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File operations consumed by the comparator
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Whether a file exists at `path`
    async fn exists(&self, path: &Path) -> bool;

    /// Read the whole file
    async fn read_bytes(&self, path: &Path) -> VerificarResult<Vec<u8>>;

    /// Create or replace the file with `bytes`
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> VerificarResult<()>;

    /// Create `path` and its parents if absent
    async fn ensure_directory(&self, path: &Path) -> VerificarResult<()>;
}

/// [`FileStore`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    /// Create a local store
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn read_bytes(&self, path: &Path) -> VerificarResult<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> VerificarResult<()> {
        Ok(tokio::fs::write(path, bytes).await?)
    }

    async fn ensure_directory(&self, path: &Path) -> VerificarResult<()> {
        Ok(tokio::fs::create_dir_all(path).await?)
    }
}

/// In-memory [`FileStore`] for tests
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    directories: Mutex<HashSet<PathBuf>>,
    read_only: bool,
}

impl MemoryFileStore {
    /// Empty, writable store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes and directory creation always fail
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Seed a file
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), bytes);
        }
        self
    }

    /// Contents of `path`, if present
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }

    /// All file paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .files
            .lock()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    /// Whether `ensure_directory` was called for `path`
    #[must_use]
    pub fn has_directory(&self, path: &Path) -> bool {
        self.directories
            .lock()
            .map(|d| d.contains(path))
            .unwrap_or(false)
    }

    fn denied(path: &Path) -> VerificarError {
        std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("read-only store: {}", path.display()),
        )
        .into()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn exists(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    async fn read_bytes(&self, path: &Path) -> VerificarResult<Vec<u8>> {
        self.get(path).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
            .into()
        })
    }

    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> VerificarResult<()> {
        if self.read_only {
            return Err(Self::denied(path));
        }
        let mut files = self
            .files
            .lock()
            .map_err(|_| VerificarError::driver("file store lock poisoned"))?;
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    async fn ensure_directory(&self, path: &Path) -> VerificarResult<()> {
        if self.read_only {
            return Err(Self::denied(path));
        }
        let mut dirs = self
            .directories
            .lock()
            .map_err(|_| VerificarError::driver("file store lock poisoned"))?;
        dirs.insert(path.to_path_buf());
        Ok(())
    }
}
