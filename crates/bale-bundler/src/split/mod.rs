//! Partitioning of a module graph into chunks.
//!
//! Assignment runs in a fixed order:
//! 1. vendor grouping: installed modules go to `npm.<package>` chunks
//! 2. shared extraction among the remaining modules, to a fixed point
//! 3. entry chunks take what is left, in depth-first pre-order
//!
//! A module's sharing degree is the larger of the number of entries that
//! reach it and the number of distinct modules importing it. Modules whose
//! degree exceeds `min_chunks` are shared; so are non-entry modules whose
//! importers have all been moved to the shared chunk.

use bale_config::RuntimeChunk;
use bale_graph::{installed_package, vendor_chunk_name, ModuleGraph, ModuleId};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BuildConfiguration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Runtime,
    Shared,
    Vendor,
    Entry,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Runtime => "runtime",
            ChunkKind::Shared => "shared",
            ChunkKind::Vendor => "vendor",
            ChunkKind::Entry => "entry",
        }
    }
}

/// One planned output chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Members in first-discovered order
    pub modules: Vec<ModuleId>,
    /// Chunks that must be loaded before this entry starts, in load order
    pub requires: Vec<String>,
    /// Entry module, for entry chunks
    pub entry: Option<ModuleId>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("chunk name '{name}' is used by both a {first} chunk and a {second} chunk")]
    NameCollision {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("entry '{entry}' ({module}) is inside installed package '{package}', which vendor grouping would also claim")]
    VendoredEntry {
        entry: String,
        module: ModuleId,
        package: String,
    },
}

/// Chunking knobs taken from the build configuration.
#[derive(Debug, Clone)]
pub struct SplitPolicy {
    pub min_chunks: usize,
    pub vendor: bool,
    pub vendor_prefix: String,
    pub shared_name: String,
    pub runtime_name: String,
    pub runtime: RuntimeChunk,
    pub install_dirs: Vec<String>,
}

impl SplitPolicy {
    pub fn from_config(config: &BuildConfiguration) -> Self {
        let split = &config.options.optimization.split_chunks;
        Self {
            min_chunks: split.min_chunks,
            vendor: config.caps.vendor_split,
            vendor_prefix: split.vendor_prefix.clone(),
            shared_name: split.shared_name.clone(),
            runtime_name: split.runtime_name.clone(),
            runtime: config.caps.runtime_chunk,
            install_dirs: config.options.resolve.modules.clone(),
        }
    }
}

/// Chunks in load order: runtime, shared, vendors, entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn get(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.name == name)
    }

    /// Name of the chunk holding `id`.
    pub fn chunk_of(&self, id: &ModuleId) -> Option<&str> {
        self.chunks
            .iter()
            .find(|chunk| chunk.modules.contains(id))
            .map(|chunk| chunk.name.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.kind == ChunkKind::Entry)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

pub fn split(graph: &ModuleGraph, policy: &SplitPolicy) -> Result<ChunkPlan, SplitError> {
    let entries: Vec<(&String, &ModuleId)> = graph.entries().iter().collect();
    let reach: Vec<IndexSet<ModuleId>> = entries
        .iter()
        .map(|(_, id)| graph.reachable_from(id))
        .collect();

    // Global first-discovered order across entries.
    let mut order: IndexSet<&ModuleId> = IndexSet::new();
    for set in &reach {
        order.extend(set.iter());
    }
    let entry_modules: FxHashSet<&ModuleId> = entries.iter().map(|(_, id)| *id).collect();

    // 1. vendor grouping
    let mut vendors: IndexMap<String, Vec<ModuleId>> = IndexMap::new();
    let mut vendored: FxHashSet<&ModuleId> = FxHashSet::default();
    if policy.vendor {
        for (name, id) in &entries {
            if let Some(package) = installed_package(id.as_path(), &policy.install_dirs) {
                return Err(SplitError::VendoredEntry {
                    entry: (*name).clone(),
                    module: (*id).clone(),
                    package,
                });
            }
        }
        for &id in &order {
            if id.is_virtual() {
                continue;
            }
            if let Some(package) = installed_package(id.as_path(), &policy.install_dirs) {
                vendors
                    .entry(vendor_chunk_name(&package, &policy.vendor_prefix))
                    .or_default()
                    .push(id.clone());
                vendored.insert(id);
            }
        }
    }

    // 2. shared extraction
    let mut entries_reaching: FxHashMap<&ModuleId, usize> = FxHashMap::default();
    for set in &reach {
        for id in set {
            *entries_reaching.entry(id).or_default() += 1;
        }
    }
    let candidates: Vec<&ModuleId> = order
        .iter()
        .copied()
        .filter(|id| !vendored.contains(id) && !entry_modules.contains(id))
        .collect();

    let mut shared: FxHashSet<&ModuleId> = candidates
        .iter()
        .copied()
        .filter(|id| {
            let importers = graph.dependents(id).len();
            let reached = entries_reaching.get(id).copied().unwrap_or(0);
            importers.max(reached) > policy.min_chunks
        })
        .collect();

    loop {
        let before = shared.len();
        for &id in &candidates {
            if shared.contains(id) {
                continue;
            }
            let importers = graph.dependents(id);
            if !importers.is_empty() && importers.iter().all(|importer| shared.contains(importer)) {
                shared.insert(id);
            }
        }
        if shared.len() == before {
            break;
        }
    }

    // 3. entry chunks
    let mut owner: FxHashMap<&ModuleId, usize> = FxHashMap::default();
    for (index, &(_, id)) in entries.iter().enumerate() {
        owner.entry(id).or_insert(index);
    }
    let mut entry_members: Vec<Vec<ModuleId>> = vec![Vec::new(); entries.len()];
    for (index, set) in reach.iter().enumerate() {
        for id in set {
            if vendored.contains(id) || shared.contains(id) {
                continue;
            }
            let chunk = *owner.entry(id).or_insert(index);
            if chunk == index {
                entry_members[index].push(id.clone());
            }
        }
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    if policy.runtime == RuntimeChunk::Single && !entries.is_empty() {
        chunks.push(Chunk {
            name: policy.runtime_name.clone(),
            kind: ChunkKind::Runtime,
            modules: Vec::new(),
            requires: Vec::new(),
            entry: None,
        });
    }
    let shared_modules: Vec<ModuleId> = order
        .iter()
        .filter(|&&id| shared.contains(id))
        .map(|&id| id.clone())
        .collect();
    if !shared_modules.is_empty() {
        chunks.push(Chunk {
            name: policy.shared_name.clone(),
            kind: ChunkKind::Shared,
            modules: shared_modules,
            requires: Vec::new(),
            entry: None,
        });
    }
    for (name, modules) in vendors {
        chunks.push(Chunk {
            name,
            kind: ChunkKind::Vendor,
            modules,
            requires: Vec::new(),
            entry: None,
        });
    }

    let entry_offset = chunks.len();
    for ((name, id), modules) in entries.iter().zip(entry_members) {
        chunks.push(Chunk {
            name: (*name).clone(),
            kind: ChunkKind::Entry,
            modules,
            requires: Vec::new(),
            entry: Some((*id).clone()),
        });
    }

    check_names(&chunks)?;

    // Which chunk holds each module, by position.
    let mut location: FxHashMap<&ModuleId, usize> = FxHashMap::default();
    for (position, chunk) in chunks.iter().enumerate() {
        for id in &chunk.modules {
            location.insert(id, position);
        }
    }
    let mut requires: Vec<Vec<String>> = Vec::with_capacity(entries.len());
    for (index, set) in reach.iter().enumerate() {
        let own = entry_offset + index;
        let mut needed: IndexSet<usize> = IndexSet::new();
        for id in set {
            if let Some(&position) = location.get(id) {
                if position != own {
                    needed.insert(position);
                }
            }
        }
        let mut needed: Vec<usize> = needed.into_iter().collect();
        // Load order: runtime, shared, vendors (discovery order), other entries.
        needed.sort_unstable();
        let mut names: Vec<String> = Vec::new();
        if policy.runtime == RuntimeChunk::Single {
            names.push(policy.runtime_name.clone());
        }
        names.extend(needed.into_iter().map(|position| chunks[position].name.clone()));
        requires.push(names);
    }
    for (index, names) in requires.into_iter().enumerate() {
        chunks[entry_offset + index].requires = names;
    }

    for chunk in &chunks {
        debug!(
            chunk = %chunk.name,
            kind = chunk.kind.as_str(),
            modules = chunk.modules.len(),
            "planned chunk"
        );
    }
    info!(chunks = chunks.len(), shared = shared.len(), "chunk plan complete");
    Ok(ChunkPlan { chunks })
}

fn check_names(chunks: &[Chunk]) -> Result<(), SplitError> {
    let mut seen: FxHashMap<&str, ChunkKind> = FxHashMap::default();
    for chunk in chunks {
        if let Some(first) = seen.insert(&chunk.name, chunk.kind) {
            return Err(SplitError::NameCollision {
                name: chunk.name.clone(),
                first: first.as_str(),
                second: chunk.kind.as_str(),
            });
        }
    }
    Ok(())
}
