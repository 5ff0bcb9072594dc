//! Filesystem abstraction for the bundler.
//!
//! Resolution, reading sources and writing output all go through `Runtime`,
//! so the engine runs unchanged against the real disk (`NativeRuntime`) or an
//! in-memory tree (`MemoryRuntime`, behind the `test-utils` feature).

pub mod native;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

/// File metadata
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    /// Last modified timestamp (milliseconds since epoch)
    pub modified: Option<u64>,
}

#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Remove a directory and everything below it
    async fn remove_dir_all(&self, path: &Path) -> RuntimeResult<()>;

    /// Atomically replace `to` with `from`
    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()>;

    /// Names of the direct children of a directory
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>>;

    fn get_cwd(&self) -> RuntimeResult<PathBuf>;
}
