//! Structured diagnostics collected during a build.
//!
//! Every failure or warning the engine records ends up here as a cloneable,
//! serializable record carrying the originating module (when there is one)
//! and the stage that produced it, so a failed build can still report
//! everything it found.

use bale_graph::ModuleId;
use serde::{Deserialize, Serialize};

use crate::hooks::HookError;
use crate::resolver::ResolveError;
use crate::transform::TransformError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: DiagnosticSeverity,
    pub stage: Stage,
    pub message: String,
    /// Module the diagnostic originated from
    pub module: Option<ModuleId>,
    pub help: Option<String>,
    pub context: Option<DiagnosticContext>,
}

/// Structured context for the diagnostic kinds that carry extra data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiagnosticContext {
    UnresolvedImport {
        specifier: String,
        /// Importing module, or the project root for entries
        from_file: String,
    },
    Transform {
        rule_index: Option<usize>,
        step: String,
    },
    Cycle {
        /// Members of the strongly connected component
        cycle_path: Vec<String>,
    },
    Hook {
        hook_name: String,
    },
    Emit {
        path: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Resolution,
    Transform,
    Cycle,
    SplitPolicy,
    EmitIo,
    Hook,
    Cancelled,
    /// A worker panicked or the engine hit an impossible state
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// Pipeline stage a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Resolve,
    Transform,
    Graph,
    Split,
    Emit,
    Hook,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: DiagnosticSeverity::Error,
            stage,
            message: message.into(),
            module: None,
            help: None,
            context: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(kind, stage, message)
        }
    }

    pub fn with_module(mut self, module: ModuleId) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_context(mut self, context: DiagnosticContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }

    /// Unresolvable import, attributed to the importing module.
    pub fn from_resolve(error: &ResolveError, importer: Option<&ModuleId>) -> Self {
        let (specifier, from_file) = match error {
            ResolveError::NotFound { specifier, from } => (specifier.clone(), from.clone()),
            ResolveError::InvalidPackageJson { path, .. } => {
                (path.display().to_string(), path.display().to_string())
            }
        };
        let diagnostic = Self::error(DiagnosticKind::Resolution, Stage::Resolve, error.to_string())
            .with_help(format!(
                "Check that '{specifier}' exists, or list it under `externals` if the page provides it."
            ))
            .with_context(DiagnosticContext::UnresolvedImport {
                specifier,
                from_file,
            });
        match importer {
            Some(id) => diagnostic.with_module(id.clone()),
            None => diagnostic,
        }
    }

    pub fn from_transform(error: &TransformError) -> Self {
        Self::error(DiagnosticKind::Transform, Stage::Transform, error.to_string())
            .with_module(error.module.clone())
            .with_context(DiagnosticContext::Transform {
                rule_index: error.rule_index,
                step: error.step.clone(),
            })
    }

    pub fn from_hook(error: &HookError) -> Self {
        Self::error(DiagnosticKind::Hook, Stage::Hook, error.to_string()).with_context(
            DiagnosticContext::Hook {
                hook_name: error.hook.clone(),
            },
        )
    }

    pub fn cycle(members: &[ModuleId]) -> Self {
        let cycle_path: Vec<String> = members.iter().map(|m| m.to_string()).collect();
        let message = if cycle_path.len() == 1 {
            format!("{} imports itself", cycle_path[0])
        } else {
            format!("Circular import between {}", cycle_path.join(" -> "))
        };
        let mut diagnostic = Self::warning(DiagnosticKind::Cycle, Stage::Graph, message)
            .with_context(DiagnosticContext::Cycle { cycle_path });
        diagnostic.module = members.first().cloned();
        diagnostic
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self::error(DiagnosticKind::Cancelled, stage, "Build cancelled")
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::Resolution => write!(f, "ResolutionError"),
            DiagnosticKind::Transform => write!(f, "TransformError"),
            DiagnosticKind::Cycle => write!(f, "CycleWarning"),
            DiagnosticKind::SplitPolicy => write!(f, "SplitPolicyViolation"),
            DiagnosticKind::EmitIo => write!(f, "EmitIOError"),
            DiagnosticKind::Hook => write!(f, "HookError"),
            DiagnosticKind::Cancelled => write!(f, "Cancelled"),
            DiagnosticKind::Internal => write!(f, "InternalError"),
        }
    }
}

/// Format diagnostics for an error message.
pub(crate) fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "Unknown build error".to_string(),
        [diag] => format!("{}: {}", diag.kind, diag.message),
        many => format!(
            "{} errors: {}",
            many.len(),
            many.iter()
                .map(|d| format!("{}: {}", d.kind, d.message))
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}
