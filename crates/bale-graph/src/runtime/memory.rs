//! In-memory `Runtime` for tests.
//!
//! Directories are implicit: a path is a directory when it was created
//! explicitly or when some stored file lives below it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
            || self.dirs.iter().any(|d| d.starts_with(path) && d != path)
            || self.files.keys().any(|f| f.starts_with(path) && f != path)
    }
}

/// A filesystem held in memory.
///
/// ```rust,ignore
/// use bale_graph::{MemoryRuntime, Runtime};
/// use std::path::Path;
///
/// let runtime = MemoryRuntime::new("/app").with_file("/app/src/index.js", "export default 1;");
/// assert!(runtime.is_file(Path::new("/app/src/index.js")));
/// assert!(runtime.is_dir(Path::new("/app/src")));
/// ```
#[derive(Debug)]
pub struct MemoryRuntime {
    cwd: PathBuf,
    tree: Mutex<Tree>,
}

impl MemoryRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            tree: Mutex::new(Tree::default()),
        }
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) -> Self {
        self.insert(path, content);
        self
    }

    /// Create or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) {
        self.tree
            .lock()
            .files
            .insert(path.into(), content.as_ref().to_vec());
    }

    /// Snapshot of a file's bytes.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.tree.lock().files.get(path.as_ref()).cloned()
    }

    /// All stored file paths below `dir`, sorted.
    pub fn files_under(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        self.tree
            .lock()
            .files
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        self.insert(path, content);
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let tree = self.tree.lock();
        if let Some(bytes) = tree.files.get(path) {
            return Ok(FileMetadata {
                size: bytes.len() as u64,
                is_dir: false,
                is_file: true,
                modified: None,
            });
        }
        if tree.is_dir(path) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
                modified: None,
            });
        }
        Err(RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.tree.lock();
        tree.files.contains_key(path) || tree.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.tree.lock().files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.tree.lock().is_dir(path)
    }

    async fn create_dir(&self, path: &Path, _recursive: bool) -> RuntimeResult<()> {
        self.tree.lock().dirs.insert(path.to_path_buf());
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        self.tree
            .lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn remove_dir_all(&self, path: &Path) -> RuntimeResult<()> {
        let mut tree = self.tree.lock();
        tree.files.retain(|p, _| !p.starts_with(path));
        tree.dirs.retain(|d| !d.starts_with(path));
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        let mut tree = self.tree.lock();
        let bytes = tree
            .files
            .remove(from)
            .ok_or_else(|| RuntimeError::FileNotFound(from.to_path_buf()))?;
        tree.files.insert(to.to_path_buf(), bytes);
        Ok(())
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let tree = self.tree.lock();
        if !tree.is_dir(path) {
            return Err(RuntimeError::FileNotFound(path.to_path_buf()));
        }
        let children: BTreeSet<String> = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(children.into_iter().collect())
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_dir_lists_direct_children() {
        let runtime = MemoryRuntime::new("/")
            .with_file("/app/src/a.js", "a")
            .with_file("/app/src/lib/b.js", "b")
            .with_file("/app/package.json", "{}");

        let names = runtime.read_dir(Path::new("/app/src")).await.unwrap();
        assert_eq!(names, vec!["a.js", "lib"]);
    }

    #[tokio::test]
    async fn remove_dir_all_clears_subtree() {
        let runtime = MemoryRuntime::new("/")
            .with_file("/dist/a.js", "a")
            .with_file("/dist/css/a.css", "a")
            .with_file("/src/a.js", "a");

        runtime.remove_dir_all(Path::new("/dist")).await.unwrap();
        assert!(!runtime.exists(Path::new("/dist/a.js")));
        assert!(runtime.is_file(Path::new("/src/a.js")));
    }
}
