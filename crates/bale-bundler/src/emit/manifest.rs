//! The manifest written next to the bundle.
//!
//! Maps chunk names to emitted file names and lists, per entry, the files a
//! page must load in order.

use bale_config::Mode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::EmittedChunk;
use crate::split::ChunkKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub mode: Mode,
    pub public_path: String,
    pub chunks: IndexMap<String, ManifestChunk>,
    pub entrypoints: IndexMap<String, Entrypoint>,
    /// Source module → emitted asset file
    pub assets: IndexMap<String, String>,
    /// Every chunk file in load order
    pub load_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    pub kind: ChunkKind,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

/// Files an entry needs, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrypoint {
    pub js: Vec<String>,
    pub css: Vec<String>,
}

impl Manifest {
    pub fn new(
        mode: Mode,
        public_path: impl Into<String>,
        chunks: &[EmittedChunk],
        assets: IndexMap<String, String>,
    ) -> Self {
        let by_name: IndexMap<&str, &EmittedChunk> =
            chunks.iter().map(|chunk| (chunk.name.as_str(), chunk)).collect();

        let mut entrypoints = IndexMap::new();
        for chunk in chunks.iter().filter(|c| c.kind == ChunkKind::Entry) {
            let mut entry = Entrypoint::default();
            let needed = chunk
                .requires
                .iter()
                .filter_map(|name| by_name.get(name.as_str()).copied())
                .chain(std::iter::once(chunk));
            for file in needed {
                entry.js.push(file.file.clone());
                entry.css.extend(file.css.clone());
            }
            entrypoints.insert(chunk.name.clone(), entry);
        }

        Self {
            mode,
            public_path: public_path.into(),
            chunks: chunks
                .iter()
                .map(|chunk| {
                    (
                        chunk.name.clone(),
                        ManifestChunk {
                            kind: chunk.kind,
                            file: chunk.file.clone(),
                            css: chunk.css.clone(),
                            map: chunk.map.clone(),
                            modules: chunk.modules.clone(),
                            requires: chunk.requires.clone(),
                        },
                    )
                })
                .collect(),
            entrypoints,
            assets,
            load_order: chunks.iter().map(|chunk| chunk.file.clone()).collect(),
        }
    }

    /// Chunk files for `entry`, in the order they must be loaded.
    pub fn scripts_for(&self, entry: &str) -> Option<&[String]> {
        self.entrypoints.get(entry).map(|e| e.js.as_slice())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
