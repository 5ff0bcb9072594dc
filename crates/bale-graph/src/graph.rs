//! Arena of module nodes keyed by identity.
//!
//! Edges are identity references stored on the importing node, so cycles need
//! no special representation. Iteration follows discovery order, which keeps
//! everything derived from the graph deterministic.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{GraphError, ModuleId, ModuleNode};

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: IndexMap<ModuleId, Arc<ModuleNode>>,
    /// Entry chunk name → entry module
    entries: IndexMap<String, ModuleId>,
    /// Target → importers, in insertion order of the importers
    dependents: FxHashMap<ModuleId, IndexSet<ModuleId>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Nodes are immutable once inserted.
    pub fn add_module(&mut self, node: impl Into<Arc<ModuleNode>>) -> Result<(), GraphError> {
        let node = node.into();
        if self.modules.contains_key(&node.id) {
            return Err(GraphError::DuplicateModule(node.id.clone()));
        }
        for dep in node.dependencies() {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(node.id.clone());
        }
        self.modules.insert(node.id.clone(), node);
        Ok(())
    }

    /// Register a named entry point. The module need not be inserted yet.
    pub fn add_entry(&mut self, name: impl Into<String>, id: ModuleId) {
        self.entries.insert(name.into(), id);
    }

    pub fn entries(&self) -> &IndexMap<String, ModuleId> {
        &self.entries
    }

    pub fn is_entry(&self, id: &ModuleId) -> bool {
        self.entries.values().any(|entry| entry == id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&Arc<ModuleNode>> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in discovery order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleNode>> {
        self.modules.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    /// Direct graph dependencies of `id`, in source order, deduplicated.
    pub fn dependencies(&self, id: &ModuleId) -> Result<Vec<&ModuleId>, GraphError> {
        let node = self
            .modules
            .get(id)
            .ok_or_else(|| GraphError::UnknownModule(id.clone()))?;
        let mut seen = FxHashSet::default();
        Ok(node.dependencies().filter(|dep| seen.insert(*dep)).collect())
    }

    /// Modules that import `id` directly.
    pub fn dependents(&self, id: &ModuleId) -> Vec<&ModuleId> {
        self.dependents
            .get(id)
            .map(|set| set.iter().filter(|d| self.modules.contains_key(*d)).collect())
            .unwrap_or_default()
    }

    /// Modules reachable from `start` (inclusive) in depth-first pre-order.
    ///
    /// Edges to modules missing from the graph are skipped.
    pub fn reachable_from(&self, start: &ModuleId) -> IndexSet<ModuleId> {
        let mut order = IndexSet::new();
        if !self.modules.contains_key(start) {
            return order;
        }

        let mut stack = vec![start.clone()];
        while let Some(id) = stack.pop() {
            if !order.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.modules.get(&id) {
                // Reverse so the first import is visited first.
                let deps: Vec<_> = node.dependencies().collect();
                for dep in deps.into_iter().rev() {
                    if !order.contains(dep) && self.modules.contains_key(dep) {
                        stack.push(dep.clone());
                    }
                }
            }
        }
        order
    }

    /// Subgraph of the entries `keep` accepts and the modules they reach.
    /// Module and entry order follow this graph.
    pub fn retain_entries(&self, mut keep: impl FnMut(&str, &ModuleId) -> bool) -> ModuleGraph {
        let mut reached = FxHashSet::default();
        let mut subgraph = ModuleGraph::new();
        for (name, entry) in &self.entries {
            if keep(name, entry) {
                reached.extend(self.reachable_from(entry));
                subgraph.add_entry(name.clone(), entry.clone());
            }
        }
        for (id, node) in &self.modules {
            if reached.contains(id) {
                for dep in node.dependencies() {
                    subgraph
                        .dependents
                        .entry(dep.clone())
                        .or_default()
                        .insert(id.clone());
                }
                subgraph.modules.insert(id.clone(), node.clone());
            }
        }
        subgraph
    }

    /// `changed` plus every module that transitively imports one of them.
    pub fn dependents_closure<'a>(
        &self,
        changed: impl IntoIterator<Item = &'a ModuleId>,
    ) -> FxHashSet<ModuleId> {
        let mut affected = FxHashSet::default();
        let mut queue: Vec<ModuleId> = changed.into_iter().cloned().collect();
        while let Some(id) = queue.pop() {
            if !affected.insert(id.clone()) {
                continue;
            }
            if let Some(importers) = self.dependents.get(&id) {
                queue.extend(importers.iter().filter(|i| !affected.contains(*i)).cloned());
            }
        }
        affected
    }

    /// Strongly connected components with more than one member, plus
    /// self-importing modules. Members and cycles are sorted by identity so
    /// the result does not depend on the order workers finished in.
    pub fn cycles(&self) -> Vec<Vec<ModuleId>> {
        let (graph, _) = self.to_digraph();
        let mut cycles: Vec<Vec<ModuleId>> = petgraph::algo::tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<ModuleId> =
                    scc.into_iter().map(|idx| graph[idx].clone()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Directed petgraph view; node indices follow discovery order.
    pub fn to_digraph(&self) -> (DiGraph<ModuleId, ()>, FxHashMap<ModuleId, NodeIndex>) {
        let mut graph = DiGraph::with_capacity(self.modules.len(), self.modules.len());
        let mut index = FxHashMap::default();
        for id in self.modules.keys() {
            index.insert(id.clone(), graph.add_node(id.clone()));
        }
        for node in self.modules.values() {
            let from = index[&node.id];
            for dep in node.dependencies() {
                if let Some(&to) = index.get(dep) {
                    graph.update_edge(from, to, ());
                }
            }
        }
        (graph, index)
    }
}
