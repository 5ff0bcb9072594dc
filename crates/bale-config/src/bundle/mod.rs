//! Core bundle configuration types.

mod helpers;
mod rules;
mod types;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub use rules::{default_rules, RuleOptions, StepOptions};
pub use types::{
    EntryPoints, ErrorPolicy, HtmlOptions, OptimizationOptions, OutputOptions, ResolveOptions,
    SplitChunksOptions,
};

use crate::error::ConfigError;
use crate::mode::{Mode, ModeCapabilities, ModuleIds};

/// Main bundle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleOptions {
    /// Entry points, resolved against `root`
    #[serde(default)]
    pub entries: EntryPoints,

    #[serde(default)]
    pub mode: Mode,

    /// Project root; the process working directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default)]
    pub resolve: ResolveOptions,

    /// Transform rules, first match wins
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleOptions>,

    /// Specifier → runtime global. Matching imports are not bundled.
    #[serde(default)]
    pub externals: IndexMap<String, String>,

    /// Free identifier → specifier injected as an import when the identifier is used
    #[serde(default)]
    pub provide: IndexMap<String, String>,

    /// Inline virtual modules (`virtual:name` → source)
    #[serde(default)]
    pub virtual_modules: IndexMap<String, String>,

    #[serde(default)]
    pub optimization: OptimizationOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<HtmlOptions>,

    /// Empty the output directory before building
    #[serde(default)]
    pub clean: bool,

    /// Overrides the mode's source map switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,

    /// Overrides the mode's minification switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    /// Overrides the mode's module id style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_ids: Option<ModuleIds>,

    /// Worker count for the graph builder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,

    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl BundleOptions {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use bale_config::{BundleOptions, Mode};
    /// use serde_json::json;
    ///
    /// let value = json!({
    ///     "entries": { "app": "./src/index.js" },
    ///     "mode": "development",
    ///     "externals": { "jquery": "$" }
    /// });
    ///
    /// let options = BundleOptions::from_value(value).unwrap();
    /// assert_eq!(options.mode, Mode::Development);
    /// assert_eq!(options.externals["jquery"], "$");
    /// ```
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "bundle".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> Result<Value, ConfigError> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "bundle".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Capability row for the configured mode with explicit overrides applied.
    pub fn capabilities(&self) -> ModeCapabilities {
        let mut caps = self.mode.capabilities();
        if let Some(source_maps) = self.source_maps {
            caps.source_maps = source_maps;
        }
        if let Some(minify) = self.minify {
            caps.minify = minify;
        }
        if let Some(ids) = self.module_ids {
            caps.module_ids = ids;
        }
        if let Some(runtime) = self.optimization.runtime_chunk {
            caps.runtime_chunk = runtime;
        }
        if let Some(vendor) = self.optimization.split_chunks.vendor {
            caps.vendor_split = vendor;
        }
        caps
    }

    pub fn with_entry(mut self, name: impl Into<String>, specifier: impl Into<String>) -> Self {
        let mut named = self.entries.named();
        named.insert(name.into(), specifier.into());
        self.entries = EntryPoints::Named(named);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_external(mut self, specifier: impl Into<String>, global: impl Into<String>) -> Self {
        self.externals.insert(specifier.into(), global.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.dir = dir.into();
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            entries: EntryPoints::default(),
            mode: Mode::default(),
            root: None,
            output: OutputOptions::default(),
            resolve: ResolveOptions::default(),
            rules: default_rules(),
            externals: IndexMap::new(),
            provide: IndexMap::new(),
            virtual_modules: IndexMap::new(),
            optimization: OptimizationOptions::default(),
            html: None,
            clean: false,
            source_maps: None,
            minify: None,
            module_ids: None,
            parallelism: None,
            error_policy: ErrorPolicy::default(),
        }
    }
}
