//! Processing of a single module: read, transform, scan, resolve, link.

use std::sync::Arc;

use bale_graph::{
    installed_package, EdgeTarget, ImportEdge, ModuleId, ModuleMeta, ModuleNode, Runtime,
    VIRTUAL_PREFIX,
};
use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::hash::module_hash;
use crate::link::{link, LinkTarget};
use crate::resolver::{Resolution, Resolver, VirtualModules};
use crate::scan::scan;
use crate::transform::{Pipeline, TransformError};

/// Everything a worker task needs, shared by all tasks of one build.
#[derive(Debug)]
pub(crate) struct Worker {
    pub runtime: Arc<dyn Runtime>,
    pub resolver: Resolver,
    pub pipeline: Pipeline,
    pub virtual_modules: Arc<VirtualModules>,
    pub install_dirs: Vec<String>,
}

/// Outcome of one module. `node` is `None` when the module could not be read
/// or transformed; the reason is in `diagnostics`.
#[derive(Debug, Default)]
pub(crate) struct Processed {
    pub node: Option<ModuleNode>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Worker {
    pub async fn process(&self, id: ModuleId) -> Processed {
        let mut processed = Processed::default();

        // Content is read completely before any transform starts.
        let raw = match self.read(&id).await {
            Ok(raw) => raw,
            Err(message) => {
                processed.diagnostics.push(
                    Diagnostic::error(DiagnosticKind::Resolution, Stage::Resolve, message)
                        .with_module(id),
                );
                return processed;
            }
        };
        let content_hash = module_hash(&raw);
        let raw_size = raw.len() as u64;

        let transformed = match self.pipeline.transform(&id, raw) {
            Ok(transformed) => transformed,
            Err(err) => {
                processed.diagnostics.push(Diagnostic::from_transform(&err));
                return processed;
            }
        };

        let syntax = match scan(&transformed.code) {
            Ok(syntax) => syntax,
            Err(err) => {
                let err = TransformError {
                    rule_index: transformed.rule_index,
                    module: id,
                    step: "parse".to_string(),
                    cause: err.message,
                };
                processed.diagnostics.push(Diagnostic::from_transform(&err));
                return processed;
            }
        };
        let keys = self.pipeline.keys();
        let mut edges = Vec::with_capacity(syntax.imports.len());
        let mut targets = Vec::with_capacity(syntax.imports.len());
        for import in &syntax.imports {
            match self.resolver.resolve(&import.specifier, Some(&id)).await {
                Ok(Resolution::Module(dep)) => {
                    targets.push(LinkTarget::Module(keys.key(&dep)));
                    edges.push(ImportEdge {
                        specifier: import.specifier.clone(),
                        kind: import.kind,
                        target: EdgeTarget::Module { id: dep },
                    });
                }
                Ok(Resolution::External { global }) => {
                    targets.push(LinkTarget::External(global.clone()));
                    edges.push(ImportEdge {
                        specifier: import.specifier.clone(),
                        kind: import.kind,
                        target: EdgeTarget::External { global },
                    });
                }
                Err(err) => {
                    processed
                        .diagnostics
                        .push(Diagnostic::from_resolve(&err, Some(&id)));
                    targets.push(LinkTarget::Missing(import.specifier.clone()));
                }
            }
        }

        let code = link(&transformed.code, &syntax, &targets);
        let package = if id.is_virtual() {
            None
        } else {
            installed_package(id.as_path(), &self.install_dirs)
        };

        debug!(
            module = %id,
            imports = edges.len(),
            rule = ?transformed.rule_index,
            "processed module"
        );

        processed.node = Some(
            ModuleNode::builder(id)
                .content_hash(content_hash)
                .code(code)
                .imports(edges)
                .artifacts(transformed.artifacts)
                .meta(ModuleMeta {
                    package,
                    rule_index: transformed.rule_index,
                    raw_size,
                })
                .build(),
        );
        processed
    }

    async fn read(&self, id: &ModuleId) -> Result<Vec<u8>, String> {
        if id.is_virtual() {
            let path = id.path_string();
            let name = path.strip_prefix(VIRTUAL_PREFIX).unwrap_or(&*path);
            return self
                .virtual_modules
                .get(name)
                .map(|source| source.as_bytes().to_vec())
                .ok_or_else(|| format!("Virtual module '{id}' is not registered"));
        }
        self.runtime
            .read_file(id.as_path())
            .await
            .map_err(|e| format!("Cannot read '{id}': {e}"))
    }
}
