//! Layered configuration loading.
//!
//! Priority: environment variables > config file > defaults. The mode profile
//! is applied last.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format as _, Json, Serialized, Toml},
    Figment,
};

use crate::config::BaleConfig;
use crate::error::{ConfigError, Result};
use crate::mode::Mode;

const CONFIG_FILES: [&str; 2] = ["bale.toml", "bale.json"];

/// Finds and loads `bale.toml` / `bale.json` from a project root.
///
/// # Example
///
/// ```no_run
/// use bale_config::{ConfigLoader, Mode};
///
/// let config = ConfigLoader::new(".").load(Some(Mode::Production)).unwrap();
/// println!("{:?}", config.bundle.output.dir);
/// ```
pub struct ConfigLoader {
    root: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            env_prefix: "BALE_".to_string(),
        }
    }

    /// Use a different environment variable prefix (default `BALE_`).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// First config file present in the root, TOML before JSON.
    pub fn find(&self) -> Option<PathBuf> {
        CONFIG_FILES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    /// Load the discovered config file.
    ///
    /// `mode` selects the profile; when `None`, the mode written in the file
    /// (or its default) is used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file exists.
    pub fn load(&self, mode: Option<Mode>) -> Result<BaleConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        self.load_from(&path, mode)
    }

    /// Load a specific file, format chosen by extension.
    pub fn load_from(&self, path: &Path, mode: Option<Mode>) -> Result<BaleConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(BaleConfig::default()));

        figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                check_toml_syntax(path)?;
                figment.merge(Toml::file(path))
            }
            Some("json") => figment.merge(Json::file(path)),
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                ));
            }
        };

        // BALE_BUNDLE__MODE=development, BALE_BUNDLE__OUTPUT__DIR=out, ...
        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));

        let config: BaleConfig = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            hint: Some(format!("{e}; check {} syntax and field types", path.display())),
        })?;

        let mode = mode.unwrap_or(config.bundle.mode);
        tracing::debug!(path = %path.display(), %mode, "loaded configuration");
        config.materialize(mode)
    }
}

/// Reject malformed TOML with the parser's own message and position.
fn check_toml_syntax(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str::<toml::Value>(&content).map_err(|e| ConfigError::InvalidValue {
        field: "toml".to_string(),
        hint: Some(format!("Invalid TOML syntax in {}: {}", path.display(), e.message())),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_prefers_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bale.json"), "{}").unwrap();
        fs::write(dir.path().join("bale.toml"), "").unwrap();

        let found = ConfigLoader::new(dir.path()).find().unwrap();
        assert!(found.ends_with("bale.toml"));
    }

    #[test]
    fn load_returns_not_found_when_no_config() {
        let dir = TempDir::new().unwrap();
        let result = ConfigLoader::new(dir.path()).load(None);
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bale.toml");
        fs::write(&path, "[bundle\nmode = \"development\"").unwrap();

        let err = ConfigLoader::new(dir.path()).load(None).unwrap_err();
        match &err {
            ConfigError::InvalidValue { field, .. } => assert_eq!(field, "toml"),
            other => panic!("unexpected {other:?}"),
        }
        let hint = err.hint().unwrap();
        assert!(hint.starts_with("Invalid TOML syntax in"), "{hint}");
        assert!(hint.contains("bale.toml"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bale.yaml");
        fs::write(&path, "").unwrap();
        let result = ConfigLoader::new(dir.path()).load_from(&path, None);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
