//! Top-level configuration document and mode profile merging.
//!
//! A configuration file holds a base `[bundle]` table and optional
//! `[profiles.<mode>.bundle]` overrides. Materializing a mode deep-merges the
//! matching profile over the base, so production-only externals or
//! development-only source map settings live in data instead of code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::BundleOptions;
use crate::error::{ConfigError, Result as ConfigResult};
use crate::mode::Mode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaleConfig {
    #[serde(default)]
    pub bundle: BundleOptions,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,

    #[serde(default)]
    pub settings: GlobalSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub bundle: Value,

    #[serde(default)]
    pub settings: Value,
}

/// Settings that are not part of a build's semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// `error`, `warn`, `info`, `debug` or `trace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl BaleConfig {
    /// Create from serde_json::Value
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Apply the profile named after `mode` and pin `bundle.mode` to it.
    pub fn materialize(mut self, mode: Mode) -> ConfigResult<Self> {
        if let Some(profile) = self.profiles.get(mode.as_str()) {
            if !profile.bundle.is_null() {
                self.bundle = merged(&self.bundle, &profile.bundle)?;
            }
            if !profile.settings.is_null() {
                self.settings = merged(&self.settings, &profile.settings)?;
            }
            tracing::debug!(profile = mode.as_str(), "applied config profile");
        }
        self.bundle.mode = mode;
        Ok(self)
    }
}

fn merged<T>(base: &T, overrides: &Value) -> ConfigResult<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut value =
        serde_json::to_value(base).map_err(|err| ConfigError::InvalidProfileOverride {
            message: err.to_string(),
        })?;
    merge_values(&mut value, overrides);
    serde_json::from_value(value).map_err(|err| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    })
}

/// Deep-merge `update` into `target`. Objects merge key by key; arrays and
/// scalars replace.
pub fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_merging_keeps_base_keys() {
        let config = BaleConfig::from_value(json!({
            "bundle": {
                "entries": { "app": "./src/index.js" },
                "externals": { "react": "React" }
            },
            "profiles": {
                "production": {
                    "bundle": { "externals": { "jquery": "$" }, "clean": true }
                }
            }
        }))
        .unwrap()
        .materialize(Mode::Production)
        .unwrap();

        assert!(config.bundle.clean);
        assert_eq!(config.bundle.externals.len(), 2);
        assert_eq!(config.bundle.externals["jquery"], "$");
    }

    #[test]
    fn materialize_without_profile_sets_mode() {
        let config = BaleConfig::default().materialize(Mode::Development).unwrap();
        assert_eq!(config.bundle.mode, Mode::Development);
    }

    #[test]
    fn arrays_replace_instead_of_appending() {
        let mut base = json!({ "extensions": [".js", ".css"] });
        merge_values(&mut base, &json!({ "extensions": [".ts"] }));
        assert_eq!(base, json!({ "extensions": [".ts"] }));
    }
}
