use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const VIRTUAL_PREFIX: &str = "virtual:";

/// Unique key of a module in the graph.
///
/// Filesystem modules are identified by their cleaned path, so `./a/../b.js`
/// and `b.js` seen from the same directory compare equal. Generated modules
/// keep a `virtual:` prefix and are never touched by path cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    /// Create a module identifier from a filesystem path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }

        if path.to_string_lossy().starts_with(VIRTUAL_PREFIX) {
            return Ok(Self(path.to_path_buf()));
        }

        Ok(Self(path.clean()))
    }

    /// Create an identifier for generated content (`virtual:<id>`).
    pub fn new_virtual(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.starts_with(VIRTUAL_PREFIX) {
            Self(PathBuf::from(id))
        } else {
            Self(PathBuf::from(format!("{VIRTUAL_PREFIX}{id}")))
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path(self) -> PathBuf {
        self.0
    }

    pub fn is_virtual(&self) -> bool {
        self.path_string().starts_with(VIRTUAL_PREFIX)
    }

    /// Borrow the identifier as a string for logging/serialization.
    pub fn path_string(&self) -> Cow<'_, str> {
        self.0.to_string_lossy()
    }

    /// Root-relative form with forward slashes, e.g. `./src/index.js`.
    ///
    /// Virtual ids and paths outside `root` are returned unchanged.
    pub fn relative_to(&self, root: &Path) -> String {
        if self.is_virtual() {
            return self.path_string().into_owned();
        }
        match self.0.strip_prefix(root) {
            Ok(rel) => {
                let parts: Vec<_> = rel
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy()),
                        _ => None,
                    })
                    .collect();
                format!("./{}", parts.join("/"))
            }
            Err(_) => self.0.to_string_lossy().replace('\\', "/"),
        }
    }

    /// Directory that relative specifiers inside this module resolve against.
    pub fn dir(&self) -> Option<&Path> {
        if self.is_virtual() {
            None
        } else {
            self.0.parent()
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.0.extension().and_then(|ext| ext.to_str())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_string())
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ModuleId::new(value).map_err(serde::de::Error::custom)
    }
}

/// Error type for `ModuleId` construction failures.
#[derive(Debug, Error)]
pub enum ModuleIdError {
    #[error("module id path is empty")]
    EmptyPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_dot_segments() {
        let a = ModuleId::new("/app/src/../src/./a.js").unwrap();
        let b = ModuleId::new("/app/src/a.js").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn virtual_ids_are_not_cleaned() {
        let id = ModuleId::new("virtual:env/../config").unwrap();
        assert!(id.is_virtual());
        assert_eq!(id.path_string(), "virtual:env/../config");
        assert_eq!(ModuleId::new_virtual("env"), ModuleId::new_virtual("virtual:env"));
    }

    #[test]
    fn relative_form_uses_forward_slashes() {
        let id = ModuleId::new("/app/src/util/a.js").unwrap();
        assert_eq!(id.relative_to(Path::new("/app")), "./src/util/a.js");
        assert_eq!(id.relative_to(Path::new("/other")), "/app/src/util/a.js");
    }

    #[test]
    fn serde_round_trip_keeps_identity() {
        let id = ModuleId::new("/app/src/a.js").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"/app/src/a.js\"");
        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn empty_path_rejected() {
        assert!(matches!(ModuleId::new(""), Err(ModuleIdError::EmptyPath)));
    }
}
