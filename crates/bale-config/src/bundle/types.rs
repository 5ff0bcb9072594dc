use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::helpers::*;
use crate::mode::RuntimeChunk;

/// Entry points: a single specifier, a list, or named specifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoints {
    Single(String),
    Multiple(Vec<String>),
    Named(IndexMap<String, String>),
}

impl Default for EntryPoints {
    fn default() -> Self {
        EntryPoints::Multiple(Vec::new())
    }
}

impl EntryPoints {
    pub fn is_empty(&self) -> bool {
        match self {
            EntryPoints::Single(s) => s.trim().is_empty(),
            EntryPoints::Multiple(v) => v.is_empty(),
            EntryPoints::Named(m) => m.is_empty(),
        }
    }

    /// Normalize to `(chunk name, specifier)` pairs.
    ///
    /// A single unnamed entry is called `main`; list entries are named after
    /// their file stem.
    pub fn named(&self) -> IndexMap<String, String> {
        match self {
            EntryPoints::Single(spec) => IndexMap::from([("main".to_string(), spec.clone())]),
            EntryPoints::Multiple(specs) => specs
                .iter()
                .map(|spec| (entry_stem(spec), spec.clone()))
                .collect(),
            EntryPoints::Named(map) => map.clone(),
        }
    }
}

fn entry_stem(spec: &str) -> String {
    let file = spec.rsplit(['/', '\\']).next().unwrap_or(spec);
    match file.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

/// Output location and filename templates.
///
/// Templates accept `[name]`, `[id]`, `[hash]`, `[hash:N]`, `[contenthash]`
/// and `[ext]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_filename")]
    pub filename: String,

    #[serde(default = "default_css_filename")]
    pub css_filename: String,

    #[serde(default = "default_asset_filename")]
    pub asset_filename: String,

    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Prefix for URLs that reference emitted files (asset exports, HTML tags)
    #[serde(default)]
    pub public_path: String,

    /// Characters used by `[hash]` and `[contenthash]`
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            filename: default_filename(),
            css_filename: default_css_filename(),
            asset_filename: default_asset_filename(),
            manifest: default_manifest(),
            public_path: String::new(),
            hash_length: default_hash_length(),
        }
    }
}

/// Module resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Extensions tried in order when a specifier names no existing file
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Installation directory names searched for bare specifiers
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// `package.json` fields consulted for a package's entry file
    #[serde(default = "default_main_fields")]
    pub main_fields: Vec<String>,

    /// Prefix aliases (`@app` → `src/app`), relative to the project root
    #[serde(default)]
    pub alias: HashMap<String, PathBuf>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            modules: default_modules(),
            main_fields: default_main_fields(),
            alias: HashMap::new(),
        }
    }
}

/// Chunk splitting policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOptions {
    /// Overrides the mode's runtime chunk placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_chunk: Option<RuntimeChunk>,

    #[serde(default)]
    pub split_chunks: SplitChunksOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitChunksOptions {
    /// A module moves to the shared chunk once its sharing degree exceeds this
    #[serde(default = "default_min_chunks")]
    pub min_chunks: usize,

    /// Overrides the mode's vendor grouping switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<bool>,

    #[serde(default = "default_vendor_prefix")]
    pub vendor_prefix: String,

    #[serde(default = "default_shared_name")]
    pub shared_name: String,

    #[serde(default = "default_runtime_name")]
    pub runtime_name: String,
}

impl Default for SplitChunksOptions {
    fn default() -> Self {
        Self {
            min_chunks: default_min_chunks(),
            vendor: None,
            vendor_prefix: default_vendor_prefix(),
            shared_name: default_shared_name(),
            runtime_name: default_runtime_name(),
        }
    }
}

/// HTML document generation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlOptions {
    /// Path to a custom template (Jinja2 syntax), relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    #[serde(default = "default_html_filename")]
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default = "default_lang")]
    pub lang: String,

    /// Restrict the document to these entry chunks (all entries when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,

    /// Additional template variables
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            template: None,
            filename: default_html_filename(),
            title: None,
            lang: default_lang(),
            chunks: None,
            variables: HashMap::new(),
        }
    }
}

/// What a build does after the first fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Abort immediately
    FailFast,
    /// Keep building independent subtrees and report everything
    #[default]
    CollectAll,
}
