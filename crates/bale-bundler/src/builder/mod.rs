//! Module graph construction.
//!
//! The builder walks from the configured entries with a bounded pool of tokio
//! tasks. Each task processes one module (read, transform, resolve its
//! imports), inserts the node into the shared graph and claims the imports no
//! one has seen yet; claimed modules are fed back to the pool. The walk ends
//! when the queue is empty and no task is running.
//!
//! With a previous graph and an affected set, nodes outside the affected set
//! are reused as-is instead of being processed again.

mod worker;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bale_config::ErrorPolicy;
use bale_graph::{ModuleGraph, ModuleId, Runtime, VIRTUAL_PREFIX};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::BuildConfiguration;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::resolver::{Resolution, ResolveError, Resolver, VirtualModules};
use crate::transform::{Pipeline, StepRegistry};

use worker::{Processed, Worker};

/// Result of a graph walk. The graph is partial when `aborted` or
/// `cancelled` is set or when `diagnostics` holds errors.
#[derive(Debug, Default)]
pub struct GraphOutcome {
    pub graph: ModuleGraph,
    pub diagnostics: Vec<Diagnostic>,
    /// Modules read and transformed in this walk
    pub processed: usize,
    /// Modules taken unchanged from the previous graph
    pub reused: usize,
    /// Stopped at the first error under the fail-fast policy
    pub aborted: bool,
    pub cancelled: bool,
}

impl GraphOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// The graph arena and the visited set, guarded together.
#[derive(Debug, Default)]
struct Shared {
    graph: ModuleGraph,
    visited: FxHashSet<ModuleId>,
}

impl Shared {
    /// Insert `node` and return the imports seen for the first time.
    fn insert(&mut self, node: Arc<bale_graph::ModuleNode>) -> Vec<ModuleId> {
        let claimed: Vec<ModuleId> = node
            .dependencies()
            .filter(|dep| self.visited.insert((*dep).clone()))
            .cloned()
            .collect();
        if let Err(err) = self.graph.add_module(node) {
            debug!(error = %err, "module inserted twice");
        }
        claimed
    }
}

#[derive(Debug, Clone)]
pub struct GraphBuilder {
    config: Arc<BuildConfiguration>,
    worker: Arc<Worker>,
    cancel: Arc<AtomicBool>,
}

impl GraphBuilder {
    pub fn new(
        config: Arc<BuildConfiguration>,
        runtime: Arc<dyn Runtime>,
        registry: Arc<StepRegistry>,
        virtual_modules: Arc<VirtualModules>,
    ) -> Self {
        let worker = Worker {
            resolver: Resolver::new(&config, runtime.clone(), virtual_modules.clone()),
            pipeline: Pipeline::new(config.clone(), registry),
            install_dirs: config.options.resolve.modules.clone(),
            runtime,
            virtual_modules,
        };
        Self {
            config,
            worker: Arc::new(worker),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Observe `flag`; once it is set the walk stops scheduling work.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub async fn build(&self) -> GraphOutcome {
        self.build_incremental(None, &FxHashSet::default()).await
    }

    /// Walk the graph, reusing nodes of `previous` that are not in `affected`.
    pub async fn build_incremental(
        &self,
        previous: Option<&ModuleGraph>,
        affected: &FxHashSet<ModuleId>,
    ) -> GraphOutcome {
        let fail_fast = self.config.error_policy() == ErrorPolicy::FailFast;
        let mut outcome = GraphOutcome::default();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let mut pending: VecDeque<ModuleId> = VecDeque::new();

        for (name, specifier) in &self.config.entries {
            match self.resolve_entry(specifier).await {
                Ok(Resolution::Module(id)) => {
                    let mut state = shared.lock();
                    state.graph.add_entry(name.clone(), id.clone());
                    if state.visited.insert(id.clone()) {
                        pending.push_back(id);
                    }
                }
                Ok(Resolution::External { global }) => {
                    outcome.diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Resolution,
                        Stage::Resolve,
                        format!("Entry '{name}' ('{specifier}') is an external provided as '{global}'"),
                    ));
                }
                Err(err) => outcome.diagnostics.push(Diagnostic::from_resolve(&err, None)),
            }
            if fail_fast && outcome.has_errors() {
                outcome.aborted = true;
                return self.finish(outcome, shared);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));
        let mut tasks: JoinSet<Processed> = JoinSet::new();

        loop {
            while let Some(id) = pending.pop_front() {
                let reusable = previous
                    .filter(|_| !affected.contains(&id))
                    .and_then(|graph| graph.get(&id))
                    .cloned();
                if let Some(node) = reusable {
                    outcome.reused += 1;
                    pending.extend(shared.lock().insert(node));
                    continue;
                }

                let worker = Arc::clone(&self.worker);
                let permits = Arc::clone(&semaphore);
                tasks.spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return Processed::default();
                    };
                    worker.process(id).await
                });
            }

            if self.cancel.load(Ordering::SeqCst) {
                // In-flight tasks finish; their results are dropped.
                while tasks.join_next().await.is_some() {}
                outcome.cancelled = true;
                outcome.diagnostics.push(Diagnostic::cancelled(Stage::Transform));
                break;
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok(processed) => {
                    let failed = processed.diagnostics.iter().any(Diagnostic::is_error);
                    outcome.diagnostics.extend(processed.diagnostics);
                    if let Some(node) = processed.node {
                        outcome.processed += 1;
                        pending.extend(shared.lock().insert(Arc::new(node)));
                    }
                    if fail_fast && failed {
                        tasks.abort_all();
                        outcome.aborted = true;
                        break;
                    }
                }
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    outcome.diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Internal,
                        Stage::Transform,
                        format!("Module worker panicked: {err}"),
                    ));
                    if fail_fast {
                        tasks.abort_all();
                        outcome.aborted = true;
                        break;
                    }
                }
            }
        }

        self.finish(outcome, shared)
    }

    /// Entries are project-relative even without a leading `./`; a bare name
    /// that is not a file under the root is looked up as a package.
    async fn resolve_entry(&self, specifier: &str) -> Result<Resolution, ResolveError> {
        let resolver = &self.worker.resolver;
        let bare = !(specifier.starts_with('.')
            || specifier.starts_with('/')
            || specifier.starts_with(VIRTUAL_PREFIX)
            || std::path::Path::new(specifier).is_absolute());
        if bare && resolver.external(specifier).is_none() {
            if let Ok(found) = resolver.resolve(&format!("./{specifier}"), None).await {
                return Ok(found);
            }
        }
        resolver.resolve(specifier, None).await
    }

    fn finish(&self, mut outcome: GraphOutcome, shared: Arc<Mutex<Shared>>) -> GraphOutcome {
        let state = match Arc::try_unwrap(shared) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock()),
        };
        outcome.graph = state.graph;

        for cycle in outcome.graph.cycles() {
            let diagnostic = Diagnostic::cycle(&cycle);
            warn!(message = %diagnostic.message, "cycle detected");
            outcome.diagnostics.push(diagnostic);
        }

        info!(
            modules = outcome.graph.len(),
            processed = outcome.processed,
            reused = outcome.reused,
            diagnostics = outcome.diagnostics.len(),
            "module graph complete"
        );
        outcome
    }
}
