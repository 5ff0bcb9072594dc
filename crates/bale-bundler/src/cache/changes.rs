//! Change detection for incremental builds.
//!
//! Compares content hashes of reported paths against the hashes recorded in
//! the previous graph, and computes the transitive set of affected modules
//! through the graph's reverse edges.

use bale_graph::{ModuleGraph, ModuleId};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Tracks module content hashes for change detection.
///
/// Hashes are the BLAKE3 digests recorded on each graph node when the module
/// was read, so building a detector never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    pub module_hashes: HashMap<ModuleId, String>,
}

/// Set of changed modules and their transitive dependents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Known modules whose content hash changed
    pub modified: HashSet<ModuleId>,

    /// Reported paths that were not part of the previous graph
    pub added: HashSet<ModuleId>,

    /// Known modules that can no longer be read
    pub removed: HashSet<ModuleId>,

    /// Direct changes plus every module that transitively imports one.
    pub affected: HashSet<ModuleId>,
}

impl ChangeSet {
    /// Returns true if there are any changes (modified, added, or removed).
    pub fn has_changes(&self) -> bool {
        !self.modified.is_empty() || !self.added.is_empty() || !self.removed.is_empty()
    }

    pub fn affected_count(&self) -> usize {
        self.affected.len()
    }
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the hash of every non-virtual module in `graph`.
    pub fn from_graph(graph: &ModuleGraph) -> Self {
        let module_hashes = graph
            .modules()
            .filter(|node| !node.id.is_virtual())
            .map(|node| (node.id.clone(), node.content_hash.clone()))
            .collect();
        Self { module_hashes }
    }

    pub fn len(&self) -> usize {
        self.module_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module_hashes.is_empty()
    }

    /// Classify reported paths. `None` as the hash means the file could not
    /// be read.
    ///
    /// The returned `affected` set holds only the direct changes; use
    /// [`ChangeDetector::compute_affected`] for the transitive closure.
    pub fn detect_changes(&self, reported: &[(ModuleId, Option<String>)]) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for (id, hash) in reported {
            match (self.module_hashes.get(id), hash) {
                (Some(cached), Some(current)) => {
                    if cached != current {
                        changes.modified.insert(id.clone());
                    }
                }
                (Some(_), None) => {
                    changes.removed.insert(id.clone());
                }
                (None, Some(_)) => {
                    changes.added.insert(id.clone());
                }
                (None, None) => {}
            }
        }

        changes.affected.extend(changes.modified.iter().cloned());
        changes.affected.extend(changes.added.iter().cloned());
        changes.affected.extend(changes.removed.iter().cloned());
        changes
    }

    /// `changed` plus every module that transitively depends on it.
    pub fn compute_affected(
        &self,
        changed: &HashSet<ModuleId>,
        graph: &ModuleGraph,
    ) -> HashSet<ModuleId> {
        graph.dependents_closure(changed.iter())
    }
}
