//! Rendering and writing of chunk files.
//!
//! Each planned chunk becomes one JavaScript file wrapped in the registry
//! format from [`runtime`], plus an optional extracted stylesheet and source
//! map. File names come from the output templates with the content digest of
//! the rendered code. Assets collected from module artifacts and the manifest
//! are written last.
//!
//! Write failures are recorded per artifact and do not stop the remaining
//! writes; template errors are configuration errors and abort the emit.

mod manifest;
mod minify;
mod runtime;
mod sourcemap;
mod writer;

pub use manifest::{Entrypoint, Manifest, ManifestChunk};
pub use minify::{minify, Minified};
pub use sourcemap::{render_map, Mapping};
pub use writer::OutputWriter;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bale_config::RuntimeChunk;
use bale_graph::ModuleGraph;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BuildConfiguration;
use crate::diagnostics::{Diagnostic, DiagnosticContext, DiagnosticKind, Stage};
use crate::hash::digest;
use crate::link::ModuleKeys;
use crate::split::{Chunk, ChunkKind, ChunkPlan};
use crate::template::{render_filename, FilenameParams};
use crate::Result;

use runtime::{ChunkSource, PRELUDE};

/// A chunk as written to disk. File names are relative to the output
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedChunk {
    pub name: String,
    pub kind: ChunkKind,
    pub file: String,
    pub hash: String,
    pub css: Option<String>,
    pub map: Option<String>,
    /// Member modules as project-relative paths
    pub modules: Vec<String>,
    pub requires: Vec<String>,
    /// Bytes of the JavaScript file
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Chunk,
    Stylesheet,
    SourceMap,
    Asset,
    Manifest,
    Document,
    /// Written by a hook
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedFile {
    /// Relative to the output directory
    pub path: String,
    pub kind: FileKind,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct EmitOutcome {
    pub chunks: Vec<EmittedChunk>,
    pub files: Vec<EmittedFile>,
    /// Absent when the emit was cancelled
    pub manifest: Option<Manifest>,
    pub diagnostics: Vec<Diagnostic>,
    pub cancelled: bool,
}

struct Rendered {
    chunk: EmittedChunk,
    code: String,
    css: Option<String>,
    map: Option<String>,
}

pub struct Emitter {
    config: Arc<BuildConfiguration>,
    writer: Arc<OutputWriter>,
    keys: ModuleKeys,
    cancel: Arc<AtomicBool>,
}

impl Emitter {
    pub fn new(config: Arc<BuildConfiguration>, writer: Arc<OutputWriter>) -> Self {
        let keys = ModuleKeys::new(config.root.clone(), config.caps.module_ids);
        Self {
            config,
            writer,
            keys,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub async fn emit(&self, graph: &ModuleGraph, plan: &ChunkPlan) -> Result<EmitOutcome> {
        let mut outcome = EmitOutcome::default();
        let mut assets: IndexMap<String, Arc<[u8]>> = IndexMap::new();
        let mut asset_sources: IndexMap<String, String> = IndexMap::new();

        for (index, chunk) in plan.chunks.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                outcome.cancelled = true;
                outcome.diagnostics.push(Diagnostic::cancelled(Stage::Emit));
                return Ok(outcome);
            }

            let rendered = self.render(graph, chunk, index)?;
            self.write(&mut outcome, &rendered.chunk.file, rendered.code.as_bytes(), FileKind::Chunk)
                .await;
            if let (Some(file), Some(css)) = (&rendered.chunk.css, &rendered.css) {
                self.write(&mut outcome, file, css.as_bytes(), FileKind::Stylesheet)
                    .await;
            }
            if let (Some(file), Some(map)) = (&rendered.chunk.map, &rendered.map) {
                self.write(&mut outcome, file, map.as_bytes(), FileKind::SourceMap)
                    .await;
            }

            for id in &chunk.modules {
                let Some(node) = graph.get(id) else { continue };
                for (file_name, bytes) in node.assets() {
                    asset_sources
                        .entry(id.relative_to(&self.config.root))
                        .or_insert_with(|| file_name.to_string());
                    assets
                        .entry(file_name.to_string())
                        .or_insert_with(|| Arc::clone(bytes));
                }
            }

            debug!(
                chunk = %rendered.chunk.name,
                file = %rendered.chunk.file,
                size = rendered.chunk.size,
                "emitted chunk"
            );
            outcome.chunks.push(rendered.chunk);
        }

        for (file_name, bytes) in &assets {
            self.write(&mut outcome, file_name, bytes, FileKind::Asset).await;
        }

        let manifest = Manifest::new(
            self.config.mode(),
            self.config.options.output.public_path.clone(),
            &outcome.chunks,
            asset_sources,
        );
        match manifest.to_json() {
            Ok(json) => {
                let file = self.config.options.output.manifest.clone();
                self.write(&mut outcome, &file, json.as_bytes(), FileKind::Manifest)
                    .await;
            }
            Err(e) => outcome.diagnostics.push(Diagnostic::error(
                DiagnosticKind::Internal,
                Stage::Emit,
                format!("Failed to serialize manifest: {e}"),
            )),
        }
        outcome.manifest = Some(manifest);

        info!(
            chunks = outcome.chunks.len(),
            files = outcome.files.len(),
            "emit complete"
        );
        Ok(outcome)
    }

    fn render(&self, graph: &ModuleGraph, chunk: &Chunk, index: usize) -> Result<Rendered> {
        let caps = &self.config.caps;
        let output = &self.config.options.output;

        let mut source = ChunkSource::default();
        let with_prelude = chunk.kind == ChunkKind::Runtime
            || (chunk.kind == ChunkKind::Entry && caps.runtime_chunk == RuntimeChunk::Inline);
        if with_prelude {
            source.push_unmapped(PRELUDE);
        }

        source.open(&chunk.name);
        let mut sources = Vec::with_capacity(chunk.modules.len());
        let mut stylesheets = Vec::new();
        for id in &chunk.modules {
            let Some(node) = graph.get(id) else { continue };
            let key = self.keys.key(id);
            let source_index = sources.len() as u32;
            sources.push((id.relative_to(&self.config.root), &*node.code));
            if caps.minify {
                match minify(&node.code) {
                    Ok(minified) => source.module(
                        &key,
                        &minified.code,
                        source_index,
                        Some(minified.mappings.as_slice()),
                    ),
                    Err(err) => {
                        warn!(module = %id, error = %err, "minification failed, emitting module as is");
                        source.module(&key, &node.code, source_index, None);
                    }
                }
            } else {
                source.module(&key, &node.code, source_index, None);
            }
            stylesheets.extend(node.stylesheets().map(str::to_string));
        }
        let entries: Vec<(String, Vec<String>)> = chunk
            .entry
            .iter()
            .map(|entry| (self.keys.key(entry), chunk.requires.clone()))
            .collect();
        source.close(&entries);

        let chunk_id = index.to_string();
        let hash = digest(caps.hash, source.code.as_bytes());
        let file = render_filename(
            &output.filename,
            &FilenameParams {
                name: &chunk.name,
                id: &chunk_id,
                ext: "js",
                hash: &hash,
                hash_length: output.hash_length,
            },
        )?;

        let (css_file, css) = if stylesheets.is_empty() {
            (None, None)
        } else {
            let css = stylesheets.join("\n");
            let css_hash = digest(caps.hash, css.as_bytes());
            let css_file = render_filename(
                &output.css_filename,
                &FilenameParams {
                    name: &chunk.name,
                    id: &chunk_id,
                    ext: "css",
                    hash: &css_hash,
                    hash_length: output.hash_length,
                },
            )?;
            (Some(css_file), Some(css))
        };

        let mut code = source.code;
        let (map_file, map) = if caps.source_maps {
            let map_file = format!("{file}.map");
            let map = render_map(&base_name(&file), &sources, &source.mappings);
            code.push_str(&format!("\n//# sourceMappingURL={}", base_name(&map_file)));
            (Some(map_file), Some(map))
        } else {
            (None, None)
        };
        code.push('\n');

        let hash_length = output.hash_length.min(hash.len());
        Ok(Rendered {
            chunk: EmittedChunk {
                name: chunk.name.clone(),
                kind: chunk.kind,
                file,
                hash: hash[..hash_length].to_string(),
                css: css_file,
                map: map_file,
                modules: chunk
                    .modules
                    .iter()
                    .map(|id| id.relative_to(&self.config.root))
                    .collect(),
                requires: chunk.requires.clone(),
                size: code.len() as u64,
            },
            code,
            css,
            map,
        })
    }

    async fn write(&self, outcome: &mut EmitOutcome, file: &str, bytes: &[u8], kind: FileKind) {
        match self.writer.write(file, bytes).await {
            Ok(_) => outcome.files.push(EmittedFile {
                path: file.to_string(),
                kind,
                size: bytes.len() as u64,
            }),
            Err(err) => {
                warn!(file, error = %err, "failed to write output file");
                outcome.diagnostics.push(
                    Diagnostic::error(DiagnosticKind::EmitIo, Stage::Emit, err.to_string())
                        .with_context(DiagnosticContext::Emit {
                            path: file.to_string(),
                        }),
                );
            }
        }
    }
}

fn base_name(file: &str) -> String {
    Path::new(file)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}
