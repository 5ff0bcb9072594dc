//! Rule-driven transform pipeline.
//!
//! Each module is matched against the configured rules in declaration order;
//! the first rule that accepts its identity supplies the steps, which run in
//! sequence with the output of one feeding the next. A module no rule accepts
//! is passed through as UTF-8 text.
//!
//! Built-in steps are selected by [`StepOptions`]; `custom` descriptors are
//! looked up by name in a [`StepRegistry`] populated by the embedding program.

mod steps;

pub use steps::{AssetStep, JsonStep, ScriptStep, StyleExtractStep, StyleInjectStep};

use std::path::Path;
use std::sync::Arc;

use bale_config::{ModeCapabilities, OutputOptions, StepOptions, StyleHandling};
use bale_graph::{installed_package, ModuleId, SideArtifact};
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::config::{BuildConfiguration, CompiledRule};
use crate::link::{quote, ModuleKeys};
use crate::scan::scan;

/// A transform step failed on one module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Transform failed for '{module}' in step '{step}': {cause}")]
pub struct TransformError {
    /// Rule that selected the failing step
    pub rule_index: Option<usize>,
    pub module: ModuleId,
    pub step: String,
    pub cause: String,
}

/// Error returned by a single step; the pipeline attaches module and rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct StepError(pub String);

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Everything a step may consult besides its input bytes.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub id: &'a ModuleId,
    /// Registry key the module will run under
    pub key: &'a str,
    pub root: &'a Path,
    pub caps: &'a ModeCapabilities,
    pub output: &'a OutputOptions,
    pub rule: Option<&'a CompiledRule>,
    /// Options object of a `custom` descriptor; `Null` for built-ins
    pub options: &'a Value,
    /// Byte length of the module as read, before any step ran
    pub raw_len: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    pub bytes: Vec<u8>,
    pub artifacts: Vec<SideArtifact>,
}

impl StepOutput {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: SideArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

/// One stage of a rule's pipeline.
///
/// Steps are synchronous and must not keep state between calls; the same
/// instance runs on every worker.
pub trait TransformStep: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, input: Vec<u8>, ctx: &StepContext<'_>) -> Result<StepOutput, StepError>;
}

/// Named steps available to `custom` rule descriptors.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: FxHashMap<String, Arc<dyn TransformStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` under its own name, replacing any previous entry.
    pub fn register(&mut self, step: Arc<dyn TransformStep>) {
        self.steps.insert(step.name().to_string(), step);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TransformStep>> {
        self.steps.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.steps.keys().collect();
        names.sort();
        f.debug_struct("StepRegistry").field("steps", &names).finish()
    }
}

/// Result of running the pipeline on one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// JavaScript source, imports still unlinked
    pub code: String,
    pub artifacts: Vec<SideArtifact>,
    pub rule_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<BuildConfiguration>,
    registry: Arc<StepRegistry>,
    keys: ModuleKeys,
}

impl Pipeline {
    pub fn new(config: Arc<BuildConfiguration>, registry: Arc<StepRegistry>) -> Self {
        let keys = ModuleKeys::new(config.root.clone(), config.caps.module_ids);
        Self {
            config,
            registry,
            keys,
        }
    }

    pub fn keys(&self) -> &ModuleKeys {
        &self.keys
    }

    /// Run the steps of the first matching rule over `raw`.
    pub fn transform(&self, id: &ModuleId, raw: Vec<u8>) -> Result<Transformed, TransformError> {
        let rule = self.config.rule_for(id);
        let rule_index = rule.map(|rule| rule.index);
        let key = self.keys.key(id);
        let fail = |step: &str, cause: String| TransformError {
            rule_index,
            module: id.clone(),
            step: step.to_string(),
            cause,
        };

        let raw_len = raw.len() as u64;
        let mut bytes = raw;
        let mut artifacts = Vec::new();
        let mut generates_module = false;

        if let Some(rule) = rule {
            for descriptor in &rule.steps {
                let (step, options) = self.select(descriptor).ok_or_else(|| {
                    fail(
                        descriptor.label(),
                        format!("no step named '{}' is registered", descriptor.label()),
                    )
                })?;
                let ctx = StepContext {
                    id,
                    key: &key,
                    root: &self.config.root,
                    caps: &self.config.caps,
                    output: &self.config.options.output,
                    rule: Some(rule),
                    options,
                    raw_len,
                };
                trace!(module = %id, step = step.name(), "applying transform step");
                let output = step
                    .apply(bytes, &ctx)
                    .map_err(|e| fail(descriptor.label(), e.0))?;
                bytes = output.bytes;
                artifacts.extend(output.artifacts);
                generates_module |= !matches!(
                    descriptor,
                    StepOptions::Script | StepOptions::Custom { .. }
                );
            }
        }

        let mut code = String::from_utf8(bytes).map_err(|_| {
            fail(
                rule.and_then(|r| r.steps.last())
                    .map_or("passthrough", StepOptions::label),
                "output is not valid UTF-8".to_string(),
            )
        })?;

        if !generates_module {
            self.inject_provided(id, &mut code);
        }

        Ok(Transformed {
            code,
            artifacts,
            rule_index,
        })
    }

    fn select<'a>(
        &'a self,
        descriptor: &'a StepOptions,
    ) -> Option<(Arc<dyn TransformStep>, &'a Value)> {
        static NULL: Value = Value::Null;
        let step: Arc<dyn TransformStep> = match descriptor {
            StepOptions::Script => Arc::new(ScriptStep),
            StepOptions::Json => Arc::new(JsonStep),
            StepOptions::Asset { limit } => Arc::new(AssetStep { limit: *limit }),
            StepOptions::Style => match self.config.caps.style {
                StyleHandling::Inject => Arc::new(StyleInjectStep),
                StyleHandling::Extract => Arc::new(StyleExtractStep),
            },
            StepOptions::StyleInject => Arc::new(StyleInjectStep),
            StepOptions::StyleExtract => Arc::new(StyleExtractStep),
            StepOptions::Custom { name, options } => {
                return self.registry.get(name).map(|step| (step.clone(), options));
            }
        };
        Some((step, &NULL))
    }

    /// Prepend `var <name> = require("<specifier>");` for each provided
    /// identifier the module uses without declaring. The binding goes on the
    /// first line so later line numbers are unchanged.
    fn inject_provided(&self, id: &ModuleId, code: &mut String) {
        let provide = &self.config.options.provide;
        if provide.is_empty() || !is_script(id) {
            return;
        }

        let owner = installed_package(id.as_path(), &self.config.options.resolve.modules);
        // Unparseable modules surface as scan errors in the worker.
        let Ok(syntax) = scan(code) else {
            return;
        };
        let mut prefix = String::new();
        for (name, specifier) in provide {
            let provided_package = bale_graph::extract_package_name(specifier);
            if owner.as_deref() == Some(provided_package) {
                continue;
            }
            if syntax.uses_global(name) {
                prefix.push_str(&format!("var {name} = require({});", quote(specifier)));
            }
        }
        if !prefix.is_empty() {
            trace!(module = %id, provided = %prefix, "injecting provided bindings");
            code.insert_str(0, &prefix);
        }
    }
}

fn is_script(id: &ModuleId) -> bool {
    matches!(id.extension(), Some("js" | "mjs" | "cjs" | "jsx"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_config::{BundleOptions, Mode, RuleOptions};

    fn pipeline(options: BundleOptions) -> Pipeline {
        let config = BuildConfiguration::new(options, Path::new("/app")).unwrap();
        Pipeline::new(Arc::new(config), Arc::new(StepRegistry::new()))
    }

    fn id(path: &str) -> ModuleId {
        ModuleId::new(path).unwrap()
    }

    struct Upper;

    impl TransformStep for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn apply(&self, input: Vec<u8>, ctx: &StepContext<'_>) -> Result<StepOutput, StepError> {
            let suffix = ctx.options.get("suffix").and_then(Value::as_str).unwrap_or("");
            let text = String::from_utf8(input).map_err(|e| StepError::new(e.to_string()))?;
            Ok(StepOutput::new(format!("{}{suffix}", text.to_uppercase())))
        }
    }

    struct Double;

    impl TransformStep for Double {
        fn name(&self) -> &str {
            "double"
        }

        fn apply(&self, input: Vec<u8>, _ctx: &StepContext<'_>) -> Result<StepOutput, StepError> {
            Ok(StepOutput::new(input.repeat(2)))
        }
    }

    #[test]
    fn unmatched_modules_pass_through() {
        let p = pipeline(BundleOptions::default().with_entry("main", "./a.js"));
        let out = p
            .transform(&id("/app/node_modules/lib/index.js"), b"module.exports = 1;".to_vec())
            .unwrap();
        assert_eq!(out.code, "module.exports = 1;");
        assert_eq!(out.rule_index, None);
    }

    #[test]
    fn custom_steps_come_from_the_registry() {
        let mut options = BundleOptions::default().with_entry("main", "./a.js");
        options.rules = vec![RuleOptions::new(
            r"\.txt$",
            vec![StepOptions::Custom {
                name: "upper".into(),
                options: serde_json::json!({ "suffix": "!" }),
            }],
        )];
        let config = Arc::new(BuildConfiguration::new(options, Path::new("/app")).unwrap());

        let missing = Pipeline::new(config.clone(), Arc::new(StepRegistry::new()));
        let err = missing
            .transform(&id("/app/a.txt"), b"hi".to_vec())
            .unwrap_err();
        assert_eq!(err.step, "upper");
        assert_eq!(err.rule_index, Some(0));

        let mut registry = StepRegistry::new();
        registry.register(Arc::new(Upper));
        let p = Pipeline::new(config, Arc::new(registry));
        let out = p.transform(&id("/app/a.txt"), b"hi".to_vec()).unwrap();
        assert_eq!(out.code, "HI!");
    }

    #[test]
    fn asset_limit_sees_the_file_before_earlier_steps() {
        let mut options = BundleOptions::default()
            .with_entry("main", "./a.js")
            .with_mode(Mode::Development);
        options.rules = vec![RuleOptions::new(
            r"\.svg$",
            vec![
                StepOptions::Custom {
                    name: "double".into(),
                    options: Value::Null,
                },
                StepOptions::Asset { limit: Some(100) },
            ],
        )];
        let config = Arc::new(BuildConfiguration::new(options, Path::new("/app")).unwrap());
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(Double));
        let p = Pipeline::new(config, Arc::new(registry));

        let out = p.transform(&id("/app/src/icon.svg"), vec![b'x'; 80]).unwrap();
        assert!(out.code.contains("data:image/svg+xml;base64,"), "{}", out.code);
        assert!(out.artifacts.is_empty());
    }

    #[test]
    fn step_failure_names_rule_and_step() {
        let p = pipeline(BundleOptions::default().with_entry("main", "./a.js"));
        let err = p
            .transform(&id("/app/data.json"), b"{ broken".to_vec())
            .unwrap_err();
        assert_eq!(err.rule_index, Some(1));
        assert_eq!(err.step, "json");
        assert_eq!(err.module, id("/app/data.json"));
    }

    #[test]
    fn style_follows_the_mode() {
        let dev = pipeline(
            BundleOptions::default()
                .with_entry("main", "./a.js")
                .with_mode(Mode::Development),
        );
        let out = dev.transform(&id("/app/a.css"), b"a{}".to_vec()).unwrap();
        assert!(out.code.contains("document.createElement(\"style\")"));
        assert!(out.artifacts.is_empty());

        let prod = pipeline(
            BundleOptions::default()
                .with_entry("main", "./a.js")
                .with_mode(Mode::Production),
        );
        let out = prod.transform(&id("/app/a.css"), b"a{}".to_vec()).unwrap();
        assert_eq!(out.code, "module.exports = {};");
        assert_eq!(out.artifacts, vec![SideArtifact::Stylesheet { css: "a{}".into() }]);
    }

    #[test]
    fn provided_identifiers_are_bound_on_first_use() {
        let mut options = BundleOptions::default().with_entry("main", "./a.js");
        options.provide.insert("$".into(), "jquery".into());
        let p = pipeline(options);

        let out = p
            .transform(&id("/app/src/a.js"), b"$('.x').hide();\nfoo();".to_vec())
            .unwrap();
        assert_eq!(out.code, "var $ = require(\"jquery\");$('.x').hide();\nfoo();");

        let declared = p
            .transform(&id("/app/src/b.js"), b"import $ from 'zepto';\n$();".to_vec())
            .unwrap();
        assert!(!declared.code.starts_with("var $"));

        let own = p
            .transform(
                &id("/app/node_modules/jquery/dist/jquery.js"),
                b"$.fn = {};".to_vec(),
            )
            .unwrap();
        assert_eq!(own.code, "$.fn = {};");
    }

    #[test]
    fn destructured_and_multi_declarator_bindings_are_not_provided() {
        let mut options = BundleOptions::default().with_entry("main", "./a.js");
        options.provide.insert("$".into(), "jquery".into());
        let p = pipeline(options);

        for source in [
            "const { $ } = window.libs;\n$('x');",
            "let a = 1, $ = window.jQuery;\n$(a);",
            "function run() { var [$] = tools; return $(); }\nvar $ = 2;",
        ] {
            let out = p
                .transform(&id("/app/src/c.js"), source.as_bytes().to_vec())
                .unwrap();
            assert_eq!(out.code, source);
        }

        let inner_only = p
            .transform(
                &id("/app/src/d.js"),
                b"function f($) { return $; }
$('y');".to_vec(),
            )
            .unwrap();
        assert!(inner_only.code.starts_with("var $ = require(\"jquery\");"));
    }
}
