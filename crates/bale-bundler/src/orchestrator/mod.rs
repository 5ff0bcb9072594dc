//! Build orchestration.
//!
//! [`Bundler`] drives one build through the state machine in [`state`]:
//!
//! ```text
//! Idle → Resolving → Transforming → GraphComplete → Splitting → Emitting → Done
//!   any non-terminal state → Failed
//!   Done → Resolving (incremental)
//! ```
//!
//! Hooks run before the build, after the graph, before the split and after
//! the emit. Cancellation is checked at each of those points; work in flight
//! finishes and its results are dropped.

mod state;

pub use state::{BuildState, InvalidTransition, StateMachine};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bale_config::{BundleOptions, ErrorPolicy};
use bale_graph::{ModuleGraph, ModuleId, Runtime};
use path_clean::PathClean;
use rustc_hash::FxHashSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::builder::GraphBuilder;
use crate::cache::ChangeDetector;
use crate::config::BuildConfiguration;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::emit::{Emitter, OutputWriter};
use crate::hash::module_hash;
use crate::hooks::{BuildHook, CleanOutputHook, HookContext, HookError, HtmlDocumentHook};
use crate::report::{BuildReport, StageTiming};
use crate::resolver::VirtualModules;
use crate::split::{split, ChunkPlan, SplitPolicy};
use crate::transform::{StepRegistry, TransformStep};
use crate::Result;

/// Requests cancellation of the build currently running on a [`Bundler`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
enum HookPoint {
    BeforeBuild,
    AfterGraph,
    BeforeSplit,
    AfterEmit,
}

impl HookPoint {
    fn as_str(self) -> &'static str {
        match self {
            HookPoint::BeforeBuild => "before-build",
            HookPoint::AfterGraph => "after-graph",
            HookPoint::BeforeSplit => "before-split",
            HookPoint::AfterEmit => "after-emit",
        }
    }
}

/// Diagnostics explaining the stop are already in the report.
struct Halt;

/// The graph of the last successful build, kept for incremental rebuilds.
#[derive(Debug)]
struct Previous {
    graph: ModuleGraph,
    detector: ChangeDetector,
}

struct Run {
    report: BuildReport,
    writer: Arc<OutputWriter>,
    clock: Instant,
}

pub struct Bundler {
    config: Arc<BuildConfiguration>,
    runtime: Arc<dyn Runtime>,
    hooks: Vec<Arc<dyn BuildHook>>,
    registry: StepRegistry,
    virtual_modules: VirtualModules,
    machine: StateMachine,
    cancel: CancelHandle,
    previous: Option<Previous>,
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("root", &self.config.root)
            .field("mode", &self.config.mode())
            .field("state", &self.machine.state())
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Bundler {
    /// Validate `options` against the runtime's working directory. The
    /// built-in clean and HTML hooks are registered first.
    pub fn new(options: BundleOptions, runtime: Arc<dyn Runtime>) -> Result<Self> {
        let cwd = runtime.get_cwd()?;
        let config = BuildConfiguration::new(options, &cwd)?;
        let virtual_modules = config
            .options
            .virtual_modules
            .iter()
            .map(|(id, source)| (id.clone(), Arc::from(source.as_str())))
            .collect();

        Ok(Self {
            config: Arc::new(config),
            runtime,
            hooks: vec![Arc::new(CleanOutputHook), Arc::new(HtmlDocumentHook)],
            registry: StepRegistry::new(),
            virtual_modules,
            machine: StateMachine::default(),
            cancel: CancelHandle::default(),
            previous: None,
        })
    }

    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    /// Register a hook; hooks run in registration order.
    pub fn hook(mut self, hook: impl BuildHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Register a step for `custom` rule descriptors.
    pub fn step(mut self, step: impl TransformStep + 'static) -> Self {
        self.registry.register(Arc::new(step));
        self
    }

    /// Serve `source` for `virtual:<id>`.
    pub fn virtual_module(mut self, id: impl Into<String>, source: impl AsRef<str>) -> Self {
        self.virtual_modules
            .insert(id.into(), Arc::from(source.as_ref()));
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> BuildState {
        self.machine.state()
    }

    /// The graph of the last successful build.
    pub fn graph(&self) -> Option<&ModuleGraph> {
        self.previous.as_ref().map(|previous| &previous.graph)
    }

    /// Run a full build.
    pub async fn build(&mut self) -> BuildReport {
        self.machine.reset();
        self.previous = None;
        let span = info_span!("build", mode = self.config.mode().as_str());
        self.execute(None).instrument(span).await
    }

    /// Rebuild after `changed` paths were modified, added or removed.
    ///
    /// Only the changed modules and their transitive importers are processed
    /// again. Without a previous successful build this is a full build.
    pub async fn rebuild(&mut self, changed: &[PathBuf]) -> BuildReport {
        if self.machine.state() != BuildState::Done {
            return self.build().await;
        }
        let Some(previous) = self.previous.as_ref() else {
            return self.build().await;
        };

        let mut reported = Vec::with_capacity(changed.len());
        for path in changed {
            let path = self.absolute(path);
            let Ok(id) = ModuleId::new(&path) else {
                continue;
            };
            let hash = self
                .runtime
                .read_file(&path)
                .await
                .ok()
                .map(|bytes| module_hash(&bytes));
            reported.push((id, hash));
        }

        let changes = previous.detector.detect_changes(&reported);
        let affected = previous
            .detector
            .compute_affected(&changes.affected, &previous.graph);
        info!(
            modified = changes.modified.len(),
            added = changes.added.len(),
            removed = changes.removed.len(),
            affected = affected.len(),
            "incremental rebuild"
        );

        if self.machine.restart_incremental().is_err() {
            return self.build().await;
        }
        let span = info_span!("rebuild", mode = self.config.mode().as_str());
        self.execute(Some(affected)).instrument(span).await
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.config.root.join(path).clean()
        }
    }

    async fn execute(&mut self, affected: Option<FxHashSet<ModuleId>>) -> BuildReport {
        self.cancel.0.store(false, Ordering::SeqCst);
        let started = Instant::now();
        let mut run = Run {
            report: BuildReport::new(self.config.mode(), affected.is_some()),
            writer: Arc::new(OutputWriter::new(
                self.runtime.clone(),
                self.config.output_dir.clone(),
            )),
            clock: Instant::now(),
        };

        let previous = self.previous.take();
        match self.drive(&mut run, previous, affected.as_ref()).await {
            Ok(previous) => {
                self.previous = Some(previous);
                info!(
                    chunks = run.report.chunks.len(),
                    files = run.report.files.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "build complete"
                );
            }
            Err(Halt) => {
                let leaving = self.machine.state();
                if self.machine.advance(BuildState::Failed).is_ok() {
                    run.report.timings.push(StageTiming {
                        state: leaving,
                        duration: run.clock.elapsed(),
                    });
                }
                warn!(
                    state = ?leaving,
                    errors = run.report.errors().count(),
                    cancelled = run.report.cancelled,
                    "build failed"
                );
            }
        }

        run.report.state = self.machine.state();
        run.report.history = self.machine.history().to_vec();
        run.report
    }

    async fn drive(
        &mut self,
        run: &mut Run,
        previous: Option<Previous>,
        affected: Option<&FxHashSet<ModuleId>>,
    ) -> std::result::Result<Previous, Halt> {
        self.dispatch(HookPoint::BeforeBuild, run, None, None).await?;
        if self.machine.state() == BuildState::Idle {
            self.advance(run, BuildState::Resolving)?;
        }
        self.check_cancelled(run, Stage::Resolve)?;
        self.advance(run, BuildState::Transforming)?;

        let builder = GraphBuilder::new(
            self.config.clone(),
            self.runtime.clone(),
            Arc::new(self.registry.clone()),
            Arc::new(self.virtual_modules.clone()),
        )
        .with_cancel_flag(self.cancel.0.clone());
        let outcome = match (&previous, affected) {
            (Some(previous), Some(affected)) => {
                builder
                    .build_incremental(Some(&previous.graph), affected)
                    .await
            }
            _ => builder.build().await,
        };
        drop(previous);

        run.report.modules = outcome.graph.len();
        run.report.processed = outcome.processed;
        run.report.reused = outcome.reused;
        run.report.diagnostics.extend(outcome.diagnostics);
        if outcome.cancelled {
            run.report.cancelled = true;
            return Err(Halt);
        }
        if outcome.aborted {
            return Err(Halt);
        }
        let graph = if run.report.has_errors() {
            if self.config.error_policy() != ErrorPolicy::CollectAll {
                return Err(Halt);
            }
            let graph = healthy_subgraph(&outcome.graph, &run.report.diagnostics);
            if graph.entries().is_empty() {
                return Err(Halt);
            }
            info!(
                entries = graph.entries().len(),
                modules = graph.len(),
                "continuing with entries unaffected by errors"
            );
            graph
        } else {
            outcome.graph
        };

        self.advance(run, BuildState::GraphComplete)?;
        self.dispatch(HookPoint::AfterGraph, run, Some(&graph), None)
            .await?;
        self.check_cancelled(run, Stage::Graph)?;

        self.advance(run, BuildState::Splitting)?;
        self.dispatch(HookPoint::BeforeSplit, run, Some(&graph), None)
            .await?;
        self.check_cancelled(run, Stage::Split)?;
        let plan = match split(&graph, &SplitPolicy::from_config(&self.config)) {
            Ok(plan) => plan,
            Err(err) => {
                run.report.diagnostics.push(
                    Diagnostic::error(DiagnosticKind::SplitPolicy, Stage::Split, err.to_string())
                        .with_help(
                            "Rename the entry or disable the conflicting chunk policy in `optimization.split_chunks`.",
                        ),
                );
                return Err(Halt);
            }
        };

        self.advance(run, BuildState::Emitting)?;
        let emitter = Emitter::new(self.config.clone(), run.writer.clone())
            .with_cancel_flag(self.cancel.0.clone());
        let emitted = match emitter.emit(&graph, &plan).await {
            Ok(emitted) => emitted,
            Err(err) => {
                run.report.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::EmitIo,
                    Stage::Emit,
                    err.to_string(),
                ));
                return Err(Halt);
            }
        };
        run.report.chunks = emitted.chunks;
        run.report.files.extend(emitted.files);
        run.report.manifest = emitted.manifest;
        run.report.diagnostics.extend(emitted.diagnostics);
        if emitted.cancelled {
            run.report.cancelled = true;
            return Err(Halt);
        }

        self.dispatch(HookPoint::AfterEmit, run, Some(&graph), Some(&plan))
            .await?;
        if run.report.has_errors() {
            return Err(Halt);
        }
        self.advance(run, BuildState::Done)?;

        Ok(Previous {
            detector: ChangeDetector::from_graph(&graph),
            graph,
        })
    }

    fn advance(&mut self, run: &mut Run, next: BuildState) -> std::result::Result<(), Halt> {
        let leaving = self.machine.state();
        if let Err(err) = self.machine.advance(next) {
            run.report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::Internal,
                stage_of(leaving),
                err.to_string(),
            ));
            return Err(Halt);
        }
        run.report.timings.push(StageTiming {
            state: leaving,
            duration: run.clock.elapsed(),
        });
        run.clock = Instant::now();
        debug!(from = ?leaving, to = ?next, "build state");
        Ok(())
    }

    fn check_cancelled(&self, run: &mut Run, stage: Stage) -> std::result::Result<(), Halt> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        run.report.cancelled = true;
        run.report.diagnostics.push(Diagnostic::cancelled(stage));
        Err(Halt)
    }

    async fn dispatch(
        &self,
        point: HookPoint,
        run: &mut Run,
        graph: Option<&ModuleGraph>,
        plan: Option<&ChunkPlan>,
    ) -> std::result::Result<(), Halt> {
        for hook in &self.hooks {
            let mut ctx = HookContext {
                config: &self.config,
                report: &mut run.report,
                writer: &run.writer,
                graph,
                plan,
            };
            let result: std::result::Result<(), HookError> = match point {
                HookPoint::BeforeBuild => hook.before_build(&mut ctx).await,
                HookPoint::AfterGraph => hook.after_graph(&mut ctx).await,
                HookPoint::BeforeSplit => hook.before_split(&mut ctx).await,
                HookPoint::AfterEmit => hook.after_emit(&mut ctx).await,
            };
            if let Err(err) = result {
                warn!(hook = hook.name(), point = point.as_str(), error = %err, "hook aborted the build");
                run.report.diagnostics.push(Diagnostic::from_hook(&err));
                return Err(Halt);
            }
            debug!(hook = hook.name(), point = point.as_str(), "hook finished");
        }
        Ok(())
    }
}

/// Entries whose reachable modules all built cleanly and import nothing that
/// failed to load.
fn healthy_subgraph(graph: &ModuleGraph, diagnostics: &[Diagnostic]) -> ModuleGraph {
    let failed: FxHashSet<&ModuleId> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .filter_map(|d| d.module.as_ref())
        .collect();
    graph.retain_entries(|name, entry| {
        let reachable = graph.reachable_from(entry);
        let healthy = !reachable.is_empty()
            && reachable.iter().all(|id| {
                !failed.contains(id)
                    && graph
                        .get(id)
                        .is_some_and(|node| node.dependencies().all(|dep| graph.contains(dep)))
            });
        if !healthy {
            debug!(entry = name, "entry skipped after errors");
        }
        healthy
    })
}

fn stage_of(state: BuildState) -> Stage {
    match state {
        BuildState::Idle | BuildState::Resolving | BuildState::Done | BuildState::Failed => {
            Stage::Resolve
        }
        BuildState::Transforming => Stage::Transform,
        BuildState::GraphComplete => Stage::Graph,
        BuildState::Splitting => Stage::Split,
        BuildState::Emitting => Stage::Emit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_config::Mode;
    use bale_graph::MemoryRuntime;

    fn runtime() -> Arc<MemoryRuntime> {
        Arc::new(
            MemoryRuntime::new("/app")
                .with_file("/app/src/index.js", "import { a } from './a';\nconsole.log(a);")
                .with_file("/app/src/a.js", "export const a = 1;"),
        )
    }

    fn options() -> BundleOptions {
        BundleOptions::default()
            .with_entry("app", "./src/index.js")
            .with_mode(Mode::Development)
    }

    #[tokio::test]
    async fn successful_build_walks_every_state() {
        let mut bundler = Bundler::new(options(), runtime()).unwrap();
        let report = bundler.build().await;

        assert!(report.is_success(), "{:?}", report.diagnostics);
        assert_eq!(
            report.history,
            [
                BuildState::Idle,
                BuildState::Resolving,
                BuildState::Transforming,
                BuildState::GraphComplete,
                BuildState::Splitting,
                BuildState::Emitting,
                BuildState::Done,
            ]
        );
        assert_eq!(bundler.state(), BuildState::Done);
        assert_eq!(report.modules, 2);
        assert!(bundler.graph().is_some());
    }

    #[tokio::test]
    async fn missing_import_fails_before_split() {
        let runtime = Arc::new(
            MemoryRuntime::new("/app").with_file("/app/src/index.js", "import './missing';"),
        );
        let mut bundler = Bundler::new(options(), runtime).unwrap();
        let report = bundler.build().await;

        assert_eq!(report.state, BuildState::Failed);
        assert_eq!(report.history.last(), Some(&BuildState::Failed));
        assert!(!report.history.contains(&BuildState::Splitting));
        assert!(report.chunks.is_empty());
        assert!(bundler.graph().is_none());
    }

    #[tokio::test]
    async fn rebuild_without_changes_reuses_everything() {
        let mut bundler = Bundler::new(options(), runtime()).unwrap();
        let first = bundler.build().await;
        let second = bundler.rebuild(&[]).await;

        assert!(second.is_success(), "{:?}", second.diagnostics);
        assert!(second.incremental);
        assert_eq!(second.processed, 0);
        assert_eq!(second.reused, 2);
        assert_eq!(second.history.first(), Some(&BuildState::Done));
        assert_eq!(
            first.chunks.iter().map(|c| &c.file).collect::<Vec<_>>(),
            second.chunks.iter().map(|c| &c.file).collect::<Vec<_>>()
        );
    }
}
