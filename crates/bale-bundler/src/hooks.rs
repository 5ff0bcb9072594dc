//! Build hooks.
//!
//! Hooks run in registration order at four points of a build. Each receives
//! the frozen configuration and the in-progress report, may write extra
//! files through the build's [`OutputWriter`], and aborts the build by
//! returning an error.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bale_graph::{ModuleGraph, Runtime};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BuildConfiguration;
use crate::emit::{EmittedFile, FileKind, OutputWriter};
use crate::html::render_document;
use crate::report::BuildReport;
use crate::split::ChunkPlan;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Hook '{hook}' failed: {message}")]
pub struct HookError {
    pub hook: String,
    pub message: String,
}

impl HookError {
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

pub struct HookContext<'a> {
    pub config: &'a BuildConfiguration,
    pub report: &'a mut BuildReport,
    pub writer: &'a OutputWriter,
    /// Set from `after_graph` on
    pub graph: Option<&'a ModuleGraph>,
    /// Set from `after_emit` on
    pub plan: Option<&'a ChunkPlan>,
}

impl HookContext<'_> {
    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        self.writer.runtime()
    }

    /// Write `bytes` under the output directory and list it in the report.
    pub async fn emit_file(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        kind: FileKind,
    ) -> crate::Result<()> {
        self.writer.write(file_name, bytes).await?;
        self.report.files.retain(|file| file.path != file_name);
        self.report.files.push(EmittedFile {
            path: file_name.to_string(),
            kind,
            size: bytes.len() as u64,
        });
        Ok(())
    }
}

#[async_trait]
pub trait BuildHook: Send + Sync {
    fn name(&self) -> &str;

    async fn before_build(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_graph(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn before_split(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_emit(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }
}

/// Empties the output directory before a full build when `clean` is set.
#[derive(Debug, Default)]
pub struct CleanOutputHook;

#[async_trait]
impl BuildHook for CleanOutputHook {
    fn name(&self) -> &str {
        "clean-output"
    }

    async fn before_build(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        if !ctx.config.options.clean || ctx.report.incremental {
            return Ok(());
        }
        let dir = ctx.writer.dir();
        if !ctx.runtime().is_dir(dir) {
            return Ok(());
        }
        ctx.runtime()
            .remove_dir_all(dir)
            .await
            .map_err(|e| HookError::new(self.name(), format!("cannot clean '{}': {e}", dir.display())))?;
        info!(dir = %dir.display(), "cleaned output directory");
        Ok(())
    }
}

/// Writes the HTML document after the manifest exists, when `html` is
/// configured.
#[derive(Debug, Default)]
pub struct HtmlDocumentHook;

#[async_trait]
impl BuildHook for HtmlDocumentHook {
    fn name(&self) -> &str {
        "html-document"
    }

    async fn after_emit(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        let config = ctx.config;
        let Some(options) = config.options.html.as_ref() else {
            return Ok(());
        };
        let Some(manifest) = ctx.report.manifest.as_ref() else {
            debug!("no manifest, skipping HTML document");
            return Ok(());
        };

        let template = match &options.template {
            Some(path) => {
                let source = read_template(ctx.runtime(), &config.root.join(path))
                    .await
                    .map_err(|message| HookError::new(self.name(), message))?;
                Some(source)
            }
            None => None,
        };
        let html = render_document(options, manifest, template.as_deref())
            .map_err(|e| HookError::new(self.name(), e.to_string()))?;

        ctx.emit_file(&options.filename, html.as_bytes(), FileKind::Document)
            .await
            .map_err(|e| HookError::new(self.name(), e.to_string()))?;
        info!(file = %options.filename, "wrote HTML document");
        Ok(())
    }
}

async fn read_template(runtime: &Arc<dyn Runtime>, path: &Path) -> Result<String, String> {
    let bytes = runtime
        .read_file(path)
        .await
        .map_err(|e| format!("cannot read template '{}': {e}", path.display()))?;
    String::from_utf8(bytes).map_err(|_| format!("template '{}' is not UTF-8", path.display()))
}
