#![cfg_attr(docsrs, feature(doc_cfg))]

//! # bale-bundler
//!
//! The bundling engine: resolves a module graph from configured entry points,
//! runs every module through its rule's transform steps, partitions the graph
//! into entry, vendor, shared and runtime chunks, and writes them with
//! content-hashed names plus a manifest.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bale_bundler::{BundleOptions, Bundler, Mode, NativeRuntime};
//!
//! # #[tokio::main]
//! # async fn main() -> bale_bundler::Result<()> {
//! let options = BundleOptions::default()
//!     .with_entry("app", "./src/index.js")
//!     .with_mode(Mode::Production)
//!     .with_external("jquery", "$");
//!
//! let mut bundler = Bundler::new(options, Arc::new(NativeRuntime::new()))?;
//! let report = bundler.build().await;
//! for chunk in &report.chunks {
//!     println!("{} -> {}", chunk.name, chunk.file);
//! }
//! report.into_result()?;
//! # Ok(()) }
//! ```
//!
//! ## Incremental rebuilds
//!
//! After a successful build, [`Bundler::rebuild`] takes the paths a watcher
//! reported and re-processes only those modules and their dependents; every
//! other node is reused from the previous graph.

// Re-export the foundation crates
pub use bale_config::{
    BundleOptions, EntryPoints, ErrorPolicy, HtmlOptions, Mode, ModeCapabilities, RuleOptions,
    StepOptions,
};
pub use bale_graph::{ModuleGraph, ModuleId, ModuleNode, NativeRuntime, Runtime, SideArtifact};

pub mod builder;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod hash;
pub mod hooks;
pub mod html;
pub mod link;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod scan;
pub mod split;
pub mod template;
pub mod transform;

pub use builder::{GraphBuilder, GraphOutcome};
pub use cache::{ChangeDetector, ChangeSet};
pub use config::BuildConfiguration;
pub use diagnostics::{Diagnostic, DiagnosticContext, DiagnosticKind, DiagnosticSeverity, Stage};
pub use emit::{EmitOutcome, EmittedChunk, EmittedFile, Emitter, FileKind, Manifest, OutputWriter};
pub use hooks::{BuildHook, CleanOutputHook, HookContext, HookError, HtmlDocumentHook};
pub use orchestrator::{BuildState, Bundler, CancelHandle};
pub use report::BuildReport;
pub use resolver::{Resolution, ResolveError, Resolver};
pub use split::{Chunk, ChunkKind, ChunkPlan};
pub use transform::{
    StepContext, StepError, StepOutput, StepRegistry, TransformError, TransformStep,
};

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};


/// Error types for bale-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] bale_config::ConfigError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Chunk assignment is contradictory (name collision, vendored entry).
    #[error("Split policy violation: {0}")]
    SplitPolicy(String),

    #[error("Filename template error: {0}")]
    Template(#[from] template::TemplateError),

    /// Writing an output file failed.
    #[error("Failed to write '{path}': {message}")]
    EmitIo { path: String, message: String },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("Build was cancelled")]
    Cancelled,

    /// A build finished with fatal diagnostics.
    #[error("Build failed: {}", diagnostics::format_diagnostics(.0))]
    Build(Vec<Diagnostic>),

    #[error("Runtime error: {0}")]
    Runtime(#[from] bale_graph::RuntimeError),

    #[error("Graph error: {0}")]
    Graph(#[from] bale_graph::GraphError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bale-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::Resolution(_) => "RESOLUTION_ERROR",
            Error::Transform(_) => "TRANSFORM_ERROR",
            Error::SplitPolicy(_) => "SPLIT_POLICY_VIOLATION",
            Error::Template(_) => "INVALID_TEMPLATE",
            Error::EmitIo { .. } => "EMIT_IO_ERROR",
            Error::Hook(_) => "HOOK_ERROR",
            Error::Cancelled => "CANCELLED",
            Error::Build(_) => "BUILD_FAILED",
            Error::Runtime(_) => "RUNTIME_ERROR",
            Error::Graph(_) => "GRAPH_ERROR",
            Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Config(err) => err
                .hint()
                .map(|hint| Box::new(hint.to_string()) as Box<dyn std::fmt::Display>),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration file for syntax errors.\nError: {msg}"
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{path}' is invalid. Ensure it stays inside the output directory and doesn't contain '..' components."
            ))),
            Error::Resolution(ResolveError::NotFound { specifier, .. }) => {
                Some(Box::new(format!(
                    "Check that '{specifier}' is installed or that the relative path and extension are correct."
                )))
            }
            Error::SplitPolicy(_) => Some(Box::new(
                "Rename the entry or disable the conflicting chunk policy in `optimization.split_chunks`.",
            )),
            Error::Template(_) => Some(Box::new(
                "Filename templates accept [name], [id], [ext], [hash], [hash:N] and [contenthash].",
            )),
            Error::EmitIo { .. } => Some(Box::new(
                "Failed to write file. Check disk space and permissions.",
            )),
            Error::Build(diagnostics) => {
                let errors: Vec<&Diagnostic> =
                    diagnostics.iter().filter(|d| d.is_error()).collect();
                if errors.len() == 1 {
                    errors[0]
                        .help
                        .as_ref()
                        .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>)
                } else {
                    Some(Box::new(
                        "Multiple errors occurred. See the build report diagnostics.".to_string(),
                    ))
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic as _;

    #[test]
    fn errors_carry_codes_and_help() {
        let err = Error::SplitPolicy("chunk name 'shared' is used twice".into());
        assert_eq!(err.code().unwrap().to_string(), "SPLIT_POLICY_VIOLATION");
        assert!(err.help().is_some());

        let err = Error::from(ResolveError::NotFound {
            specifier: "lodash".into(),
            from: "/app/src/a.js".into(),
        });
        assert_eq!(err.to_string(), "Cannot resolve 'lodash' from '/app/src/a.js'");
        assert!(err.help().unwrap().to_string().contains("lodash"));
    }

    #[test]
    fn build_error_lists_diagnostics() {
        let err = Error::Build(vec![
            Diagnostic::error(DiagnosticKind::Resolution, Stage::Resolve, "a"),
            Diagnostic::error(DiagnosticKind::Transform, Stage::Transform, "b"),
        ]);
        assert_eq!(
            err.to_string(),
            "Build failed: 2 errors: ResolutionError: a; TransformError: b"
        );
    }
}
