//! Pluggable config validation strategies
//!
//! Schema checks only; whether entries exist on disk is the resolver's concern.

use crate::bundle::{BundleOptions, StepOptions};
use crate::error::{ConfigError, Result};

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    /// Validate bundle options
    fn validate(&self, config: &BundleOptions) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use bale_config::{BundleOptions, ConfigValidator, SchemaValidator};
///
/// let config = BundleOptions::default().with_entry("app", "./src/index.js");
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BundleOptions) -> Result<()> {
        if config.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        for (name, specifier) in config.entries.named() {
            if name.trim().is_empty() || specifier.trim().is_empty() {
                return Err(ConfigError::schema(
                    "entry names and specifiers cannot be empty",
                    "Give every entry a name and a module specifier",
                ));
            }
        }

        let output = &config.output;
        if output.filename.trim().is_empty() {
            return Err(ConfigError::schema(
                "output.filename cannot be empty",
                "Use a template such as \"[name].[hash].js\"",
            ));
        }
        if !(output.filename.contains("[name]") || output.filename.contains("[id]")) {
            return Err(ConfigError::schema(
                format!("output.filename '{}' would give every chunk the same name", output.filename),
                "Include [name] or [id] in the template",
            ));
        }
        if !(4..=64).contains(&output.hash_length) {
            return Err(ConfigError::schema(
                format!("output.hash_length {} is out of range", output.hash_length),
                "Use a hash length between 4 and 64",
            ));
        }

        for (specifier, global) in &config.externals {
            if specifier.trim().is_empty() {
                return Err(ConfigError::schema(
                    "external specifiers cannot be empty",
                    "Remove empty keys from 'externals'",
                ));
            }
            if !is_global_path(global) {
                return Err(ConfigError::schema(
                    format!("external '{specifier}' maps to invalid global '{global}'"),
                    "Use a JavaScript identifier path such as \"$\" or \"window.React\"",
                ));
            }
        }

        for identifier in config.provide.keys() {
            if !is_identifier(identifier) {
                return Err(ConfigError::schema(
                    format!("provided name '{identifier}' is not an identifier"),
                    "Keys of 'provide' must be JavaScript identifiers",
                ));
            }
        }

        for (index, rule) in config.rules.iter().enumerate() {
            if rule.test.is_empty() {
                return Err(ConfigError::schema(
                    format!("rule {index} has an empty test pattern"),
                    "Set 'test' to a regular expression such as \"\\\\.css$\"",
                ));
            }
            for step in &rule.steps {
                if matches!(step, StepOptions::Custom { name, .. } if name.trim().is_empty()) {
                    return Err(ConfigError::schema(
                        format!("rule {index} has a custom step without a name"),
                        "Name the step as registered with the step registry",
                    ));
                }
            }
        }

        if config.parallelism == Some(0) {
            return Err(ConfigError::schema(
                "parallelism must be at least 1",
                "Remove 'parallelism' to use the CPU count",
            ));
        }

        let split = &config.optimization.split_chunks;
        if split.shared_name.is_empty() || split.runtime_name.is_empty() {
            return Err(ConfigError::schema(
                "shared and runtime chunk names cannot be empty",
                "Leave them unset for the defaults \"shared\" and \"runtime\"",
            ));
        }

        Ok(())
    }
}

/// Convenience function for schema-only validation
pub fn validate_schema(config: &BundleOptions) -> Result<()> {
    SchemaValidator.validate(config)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_global_path(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BundleOptions {
        BundleOptions::default().with_entry("app", "./src/index.js")
    }

    #[test]
    fn schema_validator_rejects_empty_entries() {
        let result = SchemaValidator.validate(&BundleOptions::default());
        assert!(matches!(result.unwrap_err(), ConfigError::NoEntries));
    }

    #[test]
    fn schema_validator_accepts_valid_config() {
        assert!(SchemaValidator.validate(&base()).is_ok());
    }

    #[test]
    fn rejects_template_without_name() {
        let mut config = base();
        config.output.filename = "bundle.[hash].js".to_string();
        assert!(matches!(
            SchemaValidator.validate(&config).unwrap_err(),
            ConfigError::SchemaValidation { .. }
        ));
    }

    #[test]
    fn rejects_bad_external_global() {
        let config = base().with_external("jquery", "not a global");
        assert!(SchemaValidator.validate(&config).is_err());

        let config = base().with_external("react", "window.React");
        assert!(SchemaValidator.validate(&config).is_ok());
    }

    #[test]
    fn rejects_zero_parallelism() {
        let mut config = base();
        config.parallelism = Some(0);
        assert!(SchemaValidator.validate(&config).is_err());
    }
}
