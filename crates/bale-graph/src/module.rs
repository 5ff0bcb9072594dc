use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ModuleId;

/// How an import was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// `import x from '…'`, `import { a } from '…'`, `import * as ns from '…'`
    Static,
    /// `import '…'`
    SideEffect,
    /// `export … from '…'`
    ReExport,
    /// `require('…')`
    Require,
    /// `import('…')`
    Dynamic,
}

/// What an import edge points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EdgeTarget {
    Module { id: ModuleId },
    /// Provided by the page at runtime through a global
    External { global: String },
}

/// One import statement, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    /// Specifier exactly as written
    pub specifier: String,
    pub kind: ImportKind,
    pub target: EdgeTarget,
}

impl ImportEdge {
    pub fn module(&self) -> Option<&ModuleId> {
        match &self.target {
            EdgeTarget::Module { id } => Some(id),
            EdgeTarget::External { .. } => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.target, EdgeTarget::External { .. })
    }
}

/// Output produced by a transform alongside the module code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SideArtifact {
    /// CSS merged into the owning chunk's stylesheet
    Stylesheet { css: String },
    /// A standalone file copied to the output directory under `file_name`
    Asset {
        file_name: String,
        #[serde(skip)]
        bytes: Arc<[u8]>,
    },
}

/// Bookkeeping that is not needed to execute the module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMeta {
    /// Owning package when the file lives under an installation directory
    pub package: Option<String>,
    /// Index of the transform rule that matched, if any
    pub rule_index: Option<usize>,
    pub raw_size: u64,
}

/// A resolved, transformed module.
///
/// Nodes are immutable once inserted into a graph; a rebuild replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    pub id: ModuleId,
    /// BLAKE3 hex digest of the raw bytes
    pub content_hash: String,
    /// Executable module code, imports lowered to registry calls
    pub code: Arc<str>,
    pub imports: Vec<ImportEdge>,
    pub artifacts: Vec<SideArtifact>,
    pub meta: ModuleMeta,
}

impl ModuleNode {
    /// Create a new module builder with empty code and no imports.
    pub fn builder(id: ModuleId) -> ModuleNodeBuilder {
        ModuleNodeBuilder {
            node: Self {
                id,
                content_hash: String::new(),
                code: Arc::from(""),
                imports: Vec::new(),
                artifacts: Vec::new(),
                meta: ModuleMeta::default(),
            },
        }
    }

    /// Graph targets of this module's imports, in source order.
    pub fn dependencies(&self) -> impl Iterator<Item = &ModuleId> {
        self.imports.iter().filter_map(ImportEdge::module)
    }

    pub fn stylesheets(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().filter_map(|a| match a {
            SideArtifact::Stylesheet { css } => Some(css.as_str()),
            SideArtifact::Asset { .. } => None,
        })
    }

    pub fn assets(&self) -> impl Iterator<Item = (&str, &Arc<[u8]>)> {
        self.artifacts.iter().filter_map(|a| match a {
            SideArtifact::Asset { file_name, bytes } => Some((file_name.as_str(), bytes)),
            SideArtifact::Stylesheet { .. } => None,
        })
    }
}

pub struct ModuleNodeBuilder {
    node: ModuleNode,
}

impl ModuleNodeBuilder {
    pub fn content_hash(mut self, hash: impl Into<String>) -> Self {
        self.node.content_hash = hash.into();
        self
    }

    pub fn code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.node.code = code.into();
        self
    }

    pub fn import(mut self, edge: ImportEdge) -> Self {
        self.node.imports.push(edge);
        self
    }

    pub fn imports(mut self, edges: Vec<ImportEdge>) -> Self {
        self.node.imports = edges;
        self
    }

    pub fn artifacts(mut self, artifacts: Vec<SideArtifact>) -> Self {
        self.node.artifacts = artifacts;
        self
    }

    pub fn meta(mut self, meta: ModuleMeta) -> Self {
        self.node.meta = meta;
        self
    }

    pub fn build(self) -> ModuleNode {
        self.node
    }
}
