//! `Runtime` over the real filesystem.
//!
//! `std::fs` calls are blocking, so every async method runs them on tokio's
//! blocking pool.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::task;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(action: &str, path: &Path, err: io::Error) -> RuntimeError {
    if err.kind() == io::ErrorKind::NotFound {
        RuntimeError::FileNotFound(path.to_path_buf())
    } else {
        RuntimeError::Io(format!("Failed to {action} {}: {err}", path.display()))
    }
}

async fn blocking<T, F>(f: F) -> RuntimeResult<T>
where
    F: FnOnce() -> RuntimeResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| RuntimeError::Other(format!("Task join error: {e}")))?
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();
        blocking(move || std::fs::read(&path).map_err(|e| io_error("read", &path, e))).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        let content = content.to_vec();
        blocking(move || std::fs::write(&path, content).map_err(|e| io_error("write", &path, e)))
            .await
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = path.to_path_buf();
        blocking(move || {
            let metadata = std::fs::metadata(&path).map_err(|e| io_error("stat", &path, e))?;
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);

            Ok(FileMetadata {
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                is_file: metadata.is_file(),
                modified,
            })
        })
        .await
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        blocking(move || {
            let result = if recursive {
                std::fs::create_dir_all(&path)
            } else {
                std::fs::create_dir(&path)
            };
            result.map_err(|e| io_error("create directory", &path, e))
        })
        .await
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        blocking(move || std::fs::remove_file(&path).map_err(|e| io_error("remove", &path, e)))
            .await
    }

    async fn remove_dir_all(&self, path: &Path) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        blocking(move || {
            std::fs::remove_dir_all(&path).map_err(|e| io_error("remove directory", &path, e))
        })
        .await
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        let from = from.to_path_buf();
        let to = to.to_path_buf();
        blocking(move || std::fs::rename(&from, &to).map_err(|e| io_error("rename", &from, e)))
            .await
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let path = path.to_path_buf();
        blocking(move || {
            let mut names: Vec<String> = std::fs::read_dir(&path)
                .map_err(|e| io_error("read directory", &path, e))?
                .filter_map(|entry| {
                    entry
                        .ok()
                        .and_then(|e| e.file_name().to_str().map(String::from))
                })
                .collect();
            names.sort();
            Ok(names)
        })
        .await
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        std::env::current_dir().map_err(|e| RuntimeError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_rename_read() {
        let temp = TempDir::new().unwrap();
        let runtime = NativeRuntime::new();
        let tmp = temp.path().join("out.js.tmp");
        let dest = temp.path().join("out.js");

        runtime.write_file(&tmp, b"hello").await.unwrap();
        runtime.rename(&tmp, &dest).await.unwrap();

        assert!(!runtime.exists(&tmp));
        assert_eq!(runtime.read_file(&dest).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_file_maps_to_not_found() {
        let temp = TempDir::new().unwrap();
        let err = NativeRuntime
            .read_file(&temp.path().join("nope.js"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn read_dir_is_sorted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.js"), "").unwrap();
        std::fs::write(temp.path().join("a.js"), "").unwrap();

        let names = NativeRuntime.read_dir(temp.path()).await.unwrap();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }
}
