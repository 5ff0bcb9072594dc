//! Build configuration frozen for the duration of one build.
//!
//! [`BuildConfiguration`] is derived from [`BundleOptions`]: it is validated,
//! resolved against a working directory, and its rule patterns are compiled
//! once so workers can share it behind an `Arc`.

use std::path::{Path, PathBuf};

use bale_config::{
    BundleOptions, ConfigValidator, ErrorPolicy, Mode, ModeCapabilities, SchemaValidator,
    StepOptions,
};
use bale_graph::ModuleId;
use indexmap::IndexMap;
use path_clean::PathClean;
use regex::Regex;

use crate::{Error, Result};

/// A transform rule with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Position in the declared rule list
    pub index: usize,
    pub test: Regex,
    pub exclude: Option<Regex>,
    pub steps: Vec<StepOptions>,
    pub inline_limit: Option<u64>,
}

impl CompiledRule {
    pub fn matches(&self, id: &ModuleId) -> bool {
        let subject = id.path_string();
        self.test.is_match(&subject)
            && !self
                .exclude
                .as_ref()
                .is_some_and(|exclude| exclude.is_match(&subject))
    }
}

#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    pub options: BundleOptions,
    /// Absolute project root; entries and relative paths resolve against it
    pub root: PathBuf,
    /// Absolute output directory
    pub output_dir: PathBuf,
    /// Mode row with explicit overrides applied
    pub caps: ModeCapabilities,
    /// Entry chunk name → entry specifier
    pub entries: IndexMap<String, String>,
    pub rules: Vec<CompiledRule>,
    /// Worker pool size
    pub parallelism: usize,
}

impl BuildConfiguration {
    /// Validate `options` and resolve its paths against `cwd`.
    pub fn new(options: BundleOptions, cwd: &Path) -> Result<Self> {
        SchemaValidator.validate(&options)?;

        let root = match &options.root {
            Some(root) if root.is_absolute() => root.clean(),
            Some(root) => cwd.join(root).clean(),
            None => cwd.to_path_buf().clean(),
        };
        let output_dir = if options.output.dir.is_absolute() {
            options.output.dir.clean()
        } else {
            root.join(&options.output.dir).clean()
        };
        if output_dir == root || root.starts_with(&output_dir) {
            return Err(Error::InvalidOutputPath(format!(
                "output directory '{}' would contain the project root",
                output_dir.display()
            )));
        }

        let rules = options
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Ok(CompiledRule {
                    index,
                    test: compile(&rule.test, index, "test")?,
                    exclude: rule
                        .exclude
                        .as_deref()
                        .map(|pattern| compile(pattern, index, "exclude"))
                        .transpose()?,
                    steps: rule.steps.clone(),
                    inline_limit: rule.inline_limit,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let parallelism = options
            .parallelism
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1);

        Ok(Self {
            caps: options.capabilities(),
            entries: options.entries.named(),
            root,
            output_dir,
            rules,
            parallelism,
            options,
        })
    }

    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.options.error_policy
    }

    /// First rule that accepts `id`.
    pub fn rule_for(&self, id: &ModuleId) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| rule.matches(id))
    }
}

fn compile(pattern: &str, index: usize, field: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::InvalidConfig(format!("rules[{index}].{field}: {e}")))
}
