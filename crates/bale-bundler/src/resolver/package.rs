//! The slice of `package.json` the resolver needs.

use std::path::{Path, PathBuf};

use bale_graph::Runtime;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ResolveError;

/// Maximum allowed size for package.json files (10MB)
const MAX_PACKAGE_JSON_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    pub name: Option<String>,
    /// Every other top-level field; entry fields are looked up by name
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl PackageManifest {
    /// Load `dir/package.json`. A missing manifest is `Ok(None)`.
    pub async fn load(runtime: &dyn Runtime, dir: &Path) -> Result<Option<Self>, ResolveError> {
        let path = dir.join("package.json");
        if !runtime.is_file(&path) {
            return Ok(None);
        }

        let invalid = |message: String| ResolveError::InvalidPackageJson {
            path: path.clone(),
            message,
        };

        let metadata = runtime
            .metadata(&path)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        if metadata.size > MAX_PACKAGE_JSON_SIZE {
            return Err(invalid(format!(
                "exceeds maximum size of {}MB",
                MAX_PACKAGE_JSON_SIZE / 1024 / 1024
            )));
        }

        let bytes = runtime
            .read_file(&path)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| invalid(e.to_string()))
    }

    /// Entry file named by the first of `main_fields` holding a string,
    /// joined onto the package directory.
    pub fn entry(&self, dir: &Path, main_fields: &[String]) -> Option<PathBuf> {
        main_fields
            .iter()
            .filter_map(|field| self.fields.get(field).and_then(Value::as_str))
            .find(|value| !value.trim().is_empty())
            .map(|value| dir.join(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_follows_field_priority() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{ "name": "lib", "main": "./dist/index.cjs", "module": "./dist/index.mjs" }"#,
        )
        .unwrap();

        let fields = vec!["module".to_string(), "main".to_string()];
        assert_eq!(
            manifest.entry(Path::new("/nm/lib"), &fields),
            Some(PathBuf::from("/nm/lib/./dist/index.mjs"))
        );
        assert_eq!(manifest.name.as_deref(), Some("lib"));
    }

    #[test]
    fn non_string_fields_are_skipped() {
        let manifest: PackageManifest =
            serde_json::from_str(r#"{ "module": { "x": 1 }, "main": "main.js" }"#).unwrap();
        let fields = vec!["module".to_string(), "main".to_string()];
        assert_eq!(
            manifest.entry(Path::new("/p"), &fields),
            Some(PathBuf::from("/p/main.js"))
        );
    }
}
