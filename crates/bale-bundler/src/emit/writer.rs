//! Output file writing.
//!
//! Every path is validated against the output directory before anything is
//! written. Writes go to a sibling `.tmp` file that is then renamed into
//! place, under a lock per target path, so a watcher never observes a
//! partially written file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bale_graph::Runtime;
use parking_lot::Mutex;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::{Error, Result};

#[derive(Debug)]
pub struct OutputWriter {
    runtime: Arc<dyn Runtime>,
    dir: PathBuf,
    locks: Mutex<FxHashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl OutputWriter {
    pub fn new(runtime: Arc<dyn Runtime>, dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            dir: dir.into().clean(),
            locks: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Absolute target for `file_name`, which must stay inside the output
    /// directory.
    pub fn target(&self, file_name: &str) -> Result<PathBuf> {
        validate_output_path(&self.dir, file_name)
    }

    /// Atomically write `content` to `file_name` under the output directory.
    pub async fn write(&self, file_name: &str, content: &[u8]) -> Result<PathBuf> {
        let target = self.target(file_name)?;
        let lock = self.lock_for(&target);
        let _guard = lock.lock().await;

        let emit_error = |message: String| Error::EmitIo {
            path: file_name.to_string(),
            message,
        };

        if let Some(parent) = target.parent() {
            if !self.runtime.is_dir(parent) {
                self.runtime
                    .create_dir(parent, true)
                    .await
                    .map_err(|e| emit_error(format!("failed to create directory: {e}")))?;
            }
        }

        let temp = temp_path(&target);
        self.runtime
            .write_file(&temp, content)
            .await
            .map_err(|e| emit_error(format!("failed to write temporary file: {e}")))?;

        if let Err(e) = self.runtime.rename(&temp, &target).await {
            if let Err(cleanup) = self.runtime.remove_file(&temp).await {
                trace!(path = %temp.display(), error = %cleanup, "temporary file left behind");
            }
            return Err(emit_error(format!("failed to move file into place: {e}")));
        }

        trace!(path = %target.display(), bytes = content.len(), "wrote output file");
        Ok(target)
    }

    fn lock_for(&self, target: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(target.to_path_buf())
            .or_default()
            .clone()
    }
}

/// `a.js` → `a.js.tmp`, so outputs sharing a stem never share a temp file.
fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Validates an output path to prevent directory traversal.
///
/// The file name is cleaned, joined onto the base directory and cleaned
/// again; the result must still be under the base directory.
pub(crate) fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }
    if filename.is_empty() {
        return Err(Error::InvalidOutputPath("Filename is empty".to_string()));
    }

    let filename_path = Path::new(filename).clean();
    let full_path = base_dir.join(&filename_path).clean();

    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}
