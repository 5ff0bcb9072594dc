//! The build report.
//!
//! A report is returned for every build, failed or not; it holds whatever the
//! stages computed before stopping.

use std::time::Duration;

use bale_config::Mode;
use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::emit::{EmittedChunk, EmittedFile, Manifest};
use crate::orchestrator::BuildState;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub state: BuildState,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub state: BuildState,
    /// States visited, in order
    pub history: Vec<BuildState>,
    pub mode: Mode,
    pub incremental: bool,
    pub chunks: Vec<EmittedChunk>,
    pub files: Vec<EmittedFile>,
    pub manifest: Option<Manifest>,
    pub diagnostics: Vec<Diagnostic>,
    pub timings: Vec<StageTiming>,
    /// Modules in the final graph
    pub modules: usize,
    /// Modules read and transformed in this build
    pub processed: usize,
    /// Modules reused from the previous graph
    pub reused: usize,
    pub cancelled: bool,
}

impl BuildReport {
    pub fn new(mode: Mode, incremental: bool) -> Self {
        Self {
            state: BuildState::Idle,
            history: Vec::new(),
            mode,
            incremental,
            chunks: Vec::new(),
            files: Vec::new(),
            manifest: None,
            diagnostics: Vec::new(),
            timings: Vec::new(),
            modules: 0,
            processed: 0,
            reused: 0,
            cancelled: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == BuildState::Done && !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn chunk(&self, name: &str) -> Option<&EmittedChunk> {
        self.chunks.iter().find(|chunk| chunk.name == name)
    }

    /// `Ok(self)` for a successful build; otherwise the fatal diagnostics.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        if self.cancelled {
            return Err(Error::Cancelled);
        }
        Err(Error::Build(self.errors().cloned().collect()))
    }
}
