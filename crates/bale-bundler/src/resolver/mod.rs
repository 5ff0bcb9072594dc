//! Specifier resolution.
//!
//! A [`Resolver`] is created per build and holds no cache, so the answer for a
//! (specifier, importer) pair depends only on the configuration and what the
//! [`Runtime`] reports about the filesystem at that moment.
//!
//! Order of checks:
//! 1. externals (exact name or `name/…` subpath)
//! 2. `virtual:` ids registered with the build
//! 3. aliases
//! 4. relative and absolute paths
//! 5. bare specifiers, searched upward through the installation directories

mod package;

pub use package::PackageManifest;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bale_graph::{extract_package_name, ModuleId, Runtime, VIRTUAL_PREFIX};
use indexmap::IndexMap;
use path_clean::PathClean;
use thiserror::Error;
use tracing::trace;

use crate::config::BuildConfiguration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Module(ModuleId),
    /// Provided by the page through a global; no module node is created
    External { global: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Cannot resolve '{specifier}' from '{from}'")]
    NotFound { specifier: String, from: String },

    #[error("Invalid package.json at '{}': {message}", .path.display())]
    InvalidPackageJson { path: PathBuf, message: String },
}

/// Sources of generated modules, keyed by id without the `virtual:` prefix.
pub type VirtualModules = IndexMap<String, Arc<str>>;

#[derive(Debug, Clone)]
pub struct Resolver {
    runtime: Arc<dyn Runtime>,
    root: PathBuf,
    extensions: Vec<String>,
    modules: Vec<String>,
    main_fields: Vec<String>,
    /// Longest alias first so `@app/ui` beats `@app`
    alias: Vec<(String, PathBuf)>,
    externals: IndexMap<String, String>,
    virtual_modules: Arc<VirtualModules>,
}

impl Resolver {
    pub fn new(
        config: &BuildConfiguration,
        runtime: Arc<dyn Runtime>,
        virtual_modules: Arc<VirtualModules>,
    ) -> Self {
        let resolve = &config.options.resolve;
        let mut alias: Vec<(String, PathBuf)> = resolve
            .alias
            .iter()
            .map(|(name, target)| {
                let target = if target.is_absolute() {
                    target.clean()
                } else {
                    config.root.join(target).clean()
                };
                (name.clone(), target)
            })
            .collect();
        alias.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            runtime,
            root: config.root.clone(),
            extensions: resolve.extensions.clone(),
            modules: resolve.modules.clone(),
            main_fields: resolve.main_fields.clone(),
            alias,
            externals: config.options.externals.clone(),
            virtual_modules,
        }
    }

    /// Resolve `specifier` as written in `from` (or at the project root for
    /// entries and virtual importers).
    pub async fn resolve(
        &self,
        specifier: &str,
        from: Option<&ModuleId>,
    ) -> Result<Resolution, ResolveError> {
        if let Some(global) = self.external(specifier) {
            return Ok(Resolution::External {
                global: global.to_string(),
            });
        }

        let base = from.and_then(ModuleId::dir).unwrap_or(self.root.as_path());
        let not_found = || ResolveError::NotFound {
            specifier: specifier.to_string(),
            from: from
                .map(|id| id.to_string())
                .unwrap_or_else(|| self.root.display().to_string()),
        };

        if let Some(name) = specifier.strip_prefix(VIRTUAL_PREFIX) {
            return if self.virtual_modules.contains_key(name) {
                Ok(Resolution::Module(ModuleId::new_virtual(name)))
            } else {
                Err(not_found())
            };
        }

        let found = if let Some(target) = self.aliased(specifier) {
            self.resolve_path(&target).await?
        } else if is_path_like(specifier) {
            self.resolve_path(&base.join(specifier).clean()).await?
        } else {
            self.resolve_bare(specifier, base).await?
        };

        match found {
            Some(path) => {
                trace!(specifier, resolved = %path.display(), "resolved");
                ModuleId::new(path)
                    .map(Resolution::Module)
                    .map_err(|_| not_found())
            }
            None => Err(not_found()),
        }
    }

    /// Global configured for `specifier` or its package.
    pub fn external(&self, specifier: &str) -> Option<&str> {
        if let Some(global) = self.externals.get(specifier) {
            return Some(global);
        }
        self.externals
            .iter()
            .find(|(name, _)| {
                specifier
                    .strip_prefix(name.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(|(_, global)| global.as_str())
    }

    fn aliased(&self, specifier: &str) -> Option<PathBuf> {
        self.alias.iter().find_map(|(name, target)| {
            if specifier == name {
                return Some(target.clone());
            }
            specifier
                .strip_prefix(name.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| target.join(rest).clean())
        })
    }

    /// Exact file, then each extension, then the directory forms.
    async fn resolve_path(&self, candidate: &Path) -> Result<Option<PathBuf>, ResolveError> {
        if let Some(file) = self.try_file(candidate) {
            return Ok(Some(file));
        }
        if self.runtime.is_dir(candidate) {
            return self.resolve_directory(candidate).await;
        }
        Ok(None)
    }

    async fn resolve_directory(&self, dir: &Path) -> Result<Option<PathBuf>, ResolveError> {
        if let Some(manifest) = PackageManifest::load(self.runtime.as_ref(), dir).await? {
            if let Some(entry) = manifest.entry(dir, &self.main_fields) {
                let entry = entry.clean();
                if let Some(file) = self.try_file(&entry) {
                    return Ok(Some(file));
                }
                if let Some(file) = self.try_index(&entry) {
                    return Ok(Some(file));
                }
            }
        }
        Ok(self.try_index(dir))
    }

    async fn resolve_bare(
        &self,
        specifier: &str,
        base: &Path,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let name = extract_package_name(specifier);
        let subpath = specifier[name.len()..].trim_start_matches('/');

        for dir in self.search_dirs(base) {
            let package_dir = dir.join(name);
            let candidate = if subpath.is_empty() {
                package_dir.clone()
            } else {
                package_dir.join(subpath)
            };
            if !self.runtime.exists(&package_dir) && self.try_file(&candidate).is_none() {
                continue;
            }
            if let Some(found) = self.resolve_path(&candidate).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Installation directories to search, nearest first.
    fn search_dirs(&self, base: &Path) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for module_dir in &self.modules {
            let module_path = Path::new(module_dir);
            if module_path.is_absolute() {
                continue;
            }
            for ancestor in base.ancestors() {
                // `node_modules/node_modules` is never a real install location
                if ancestor.file_name().is_some_and(|n| n == module_path.as_os_str()) {
                    continue;
                }
                dirs.push((ancestor.components().count(), ancestor.join(module_path)));
            }
        }
        // Deepest ancestor first, then declared order of installation dirs.
        dirs.sort_by(|a, b| b.0.cmp(&a.0));
        let mut ordered: Vec<PathBuf> = dirs.into_iter().map(|(_, dir)| dir).collect();
        ordered.extend(
            self.modules
                .iter()
                .map(Path::new)
                .filter(|p| p.is_absolute())
                .map(Path::to_path_buf),
        );
        ordered
    }

    fn try_file(&self, candidate: &Path) -> Option<PathBuf> {
        if self.runtime.is_file(candidate) {
            return Some(candidate.to_path_buf());
        }
        self.extensions.iter().find_map(|ext| {
            let mut with_ext = candidate.as_os_str().to_owned();
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            self.runtime.is_file(&with_ext).then_some(with_ext)
        })
    }

    fn try_index(&self, dir: &Path) -> Option<PathBuf> {
        self.extensions.iter().find_map(|ext| {
            let index = dir.join(format!("index{ext}"));
            self.runtime.is_file(&index).then_some(index)
        })
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_config::BundleOptions;
    use bale_graph::MemoryRuntime;

    fn resolver(runtime: MemoryRuntime, options: BundleOptions) -> Resolver {
        let config = BuildConfiguration::new(
            options.with_entry("app", "./src/index.js"),
            Path::new("/app"),
        )
        .unwrap();
        let mut virtuals = VirtualModules::new();
        virtuals.insert("env".into(), Arc::from("export default {};"));
        Resolver::new(&config, Arc::new(runtime), Arc::new(virtuals))
    }

    fn id(path: &str) -> ModuleId {
        ModuleId::new(path).unwrap()
    }

    fn module(path: &str) -> Resolution {
        Resolution::Module(id(path))
    }

    #[tokio::test]
    async fn relative_tries_extensions_in_order() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("/app/src/index.js", "")
            .with_file("/app/src/util.mjs", "")
            .with_file("/app/src/util.json", "");
        let resolver = resolver(runtime, BundleOptions::default());
        let from = id("/app/src/index.js");

        let resolved = resolver.resolve("./util", Some(&from)).await.unwrap();
        assert_eq!(resolved, module("/app/src/util.mjs"));
    }

    #[tokio::test]
    async fn exact_path_wins_over_extension() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("/app/src/data", "")
            .with_file("/app/src/data.js", "");
        let resolver = resolver(runtime, BundleOptions::default());

        let resolved = resolver.resolve("./src/data", None).await.unwrap();
        assert_eq!(resolved, module("/app/src/data"));
    }

    #[tokio::test]
    async fn directories_resolve_to_index() {
        let runtime = MemoryRuntime::new("/app").with_file("/app/src/lib/index.js", "");
        let resolver = resolver(runtime, BundleOptions::default());
        let from = id("/app/src/index.js");

        let resolved = resolver.resolve("./lib", Some(&from)).await.unwrap();
        assert_eq!(resolved, module("/app/src/lib/index.js"));
    }

    #[tokio::test]
    async fn bare_specifiers_walk_upwards_and_honour_main_fields() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("/app/node_modules/lodash/package.json", r#"{"main": "lodash.js"}"#)
            .with_file("/app/node_modules/lodash/lodash.js", "")
            .with_file("/app/node_modules/lodash/fp.js", "");
        let resolver = resolver(runtime, BundleOptions::default());
        let from = id("/app/src/deep/nested/a.js");

        assert_eq!(
            resolver.resolve("lodash", Some(&from)).await.unwrap(),
            module("/app/node_modules/lodash/lodash.js")
        );
        assert_eq!(
            resolver.resolve("lodash/fp", Some(&from)).await.unwrap(),
            module("/app/node_modules/lodash/fp.js")
        );
    }

    #[tokio::test]
    async fn nearest_installation_wins() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("/app/node_modules/dep/index.js", "outer")
            .with_file("/app/packages/ui/node_modules/dep/index.js", "inner");
        let resolver = resolver(runtime, BundleOptions::default());
        let from = id("/app/packages/ui/button.js");

        assert_eq!(
            resolver.resolve("dep", Some(&from)).await.unwrap(),
            module("/app/packages/ui/node_modules/dep/index.js")
        );
    }

    #[tokio::test]
    async fn scoped_packages_resolve() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("/app/node_modules/@scope/pkg/package.json", r#"{"module": "esm/index.js"}"#)
            .with_file("/app/node_modules/@scope/pkg/esm/index.js", "")
            .with_file("/app/node_modules/@scope/pkg/sub/thing.js", "");
        let resolver = resolver(runtime, BundleOptions::default());

        assert_eq!(
            resolver.resolve("@scope/pkg", None).await.unwrap(),
            module("/app/node_modules/@scope/pkg/esm/index.js")
        );
        assert_eq!(
            resolver.resolve("@scope/pkg/sub/thing", None).await.unwrap(),
            module("/app/node_modules/@scope/pkg/sub/thing.js")
        );
    }

    #[tokio::test]
    async fn externals_match_exact_and_subpaths() {
        let runtime = MemoryRuntime::new("/app");
        let resolver = resolver(runtime, BundleOptions::default().with_external("jquery", "$"));

        let expected = Resolution::External { global: "$".into() };
        assert_eq!(resolver.resolve("jquery", None).await.unwrap(), expected);
        assert_eq!(resolver.resolve("jquery/ui", None).await.unwrap(), expected);
        assert!(resolver.resolve("jquery-ui", None).await.is_err());
    }

    #[tokio::test]
    async fn virtual_modules_resolve_when_registered() {
        let resolver = resolver(MemoryRuntime::new("/app"), BundleOptions::default());

        assert_eq!(
            resolver.resolve("virtual:env", None).await.unwrap(),
            Resolution::Module(ModuleId::new_virtual("env"))
        );
        assert!(matches!(
            resolver.resolve("virtual:missing", None).await,
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn aliases_rewrite_prefixes() {
        let runtime = MemoryRuntime::new("/app").with_file("/app/src/components/button.js", "");
        let mut options = BundleOptions::default();
        options
            .resolve
            .alias
            .insert("@components".into(), PathBuf::from("src/components"));
        let resolver = resolver(runtime, options);

        assert_eq!(
            resolver.resolve("@components/button", None).await.unwrap(),
            module("/app/src/components/button.js")
        );
    }

    #[tokio::test]
    async fn missing_module_reports_importer() {
        let resolver = resolver(MemoryRuntime::new("/app"), BundleOptions::default());
        let from = id("/app/src/index.js");

        let err = resolver.resolve("./nope", Some(&from)).await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound {
                specifier: "./nope".into(),
                from: "/app/src/index.js".into(),
            }
        );
    }

    #[tokio::test]
    async fn resolution_is_deterministic() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("/app/src/a.js", "")
            .with_file("/app/src/a/index.js", "");
        let resolver = resolver(runtime, BundleOptions::default());
        let from = id("/app/src/index.js");

        let first = resolver.resolve("./a", Some(&from)).await.unwrap();
        for _ in 0..5 {
            assert_eq!(resolver.resolve("./a", Some(&from)).await.unwrap(), first);
        }
        assert_eq!(first, module("/app/src/a.js"));
    }
}
