use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::helpers::default_inline_limit;

/// A transform rule: which files it applies to and which steps run on them.
///
/// `test` and `exclude` are regular expressions matched against the module
/// identity. The first rule whose `test` matches and whose `exclude` does not
/// wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOptions {
    pub test: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// Ordered transform steps; each step's output feeds the next
    #[serde(default, rename = "use")]
    pub steps: Vec<StepOptions>,

    /// Raw size (bytes) at or below which `asset` steps inline as a data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_limit: Option<u64>,
}

impl RuleOptions {
    pub fn new(test: impl Into<String>, steps: Vec<StepOptions>) -> Self {
        Self {
            test: test.into(),
            exclude: None,
            steps,
            inline_limit: None,
        }
    }

    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }
}

/// Closed set of built-in transform step descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum StepOptions {
    /// Validate UTF-8 and normalize line endings
    Script,
    /// Wrap a JSON document as a module export
    Json,
    /// Inline small files as data URLs, emit larger ones as hashed files
    Asset {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
    },
    /// Inject or extract depending on the mode capability table
    Style,
    StyleInject,
    StyleExtract,
    /// A step registered by name with the bundler's step registry
    Custom {
        name: String,
        #[serde(default)]
        options: Value,
    },
}

impl StepOptions {
    /// Short label used in diagnostics and logs.
    pub fn label(&self) -> &str {
        match self {
            StepOptions::Script => "script",
            StepOptions::Json => "json",
            StepOptions::Asset { .. } => "asset",
            StepOptions::Style => "style",
            StepOptions::StyleInject => "style-inject",
            StepOptions::StyleExtract => "style-extract",
            StepOptions::Custom { name, .. } => name,
        }
    }
}

/// Rules used when a configuration does not declare its own.
pub fn default_rules() -> Vec<RuleOptions> {
    vec![
        RuleOptions::new(r"\.m?js$", vec![StepOptions::Script]).with_exclude("node_modules"),
        RuleOptions::new(r"\.json$", vec![StepOptions::Json]),
        RuleOptions {
            test: r"\.(png|jpe?g|gif|svg|woff2?)$".to_string(),
            exclude: None,
            steps: vec![StepOptions::Asset { limit: None }],
            inline_limit: Some(default_inline_limit()),
        },
        RuleOptions::new(r"\.css$", vec![StepOptions::Style]),
    ]
}
