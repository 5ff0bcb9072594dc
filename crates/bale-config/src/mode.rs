//! Build modes and the capability table that drives mode-dependent behavior.
//!
//! The engine never branches on [`Mode`] directly. Every stage reads the
//! [`ModeCapabilities`] row for the active mode, so development and production
//! builds run the same state machine with different parameters.

use serde::{Deserialize, Serialize};

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fast rebuilds, readable module ids, source maps
    Development,
    /// Content hashes, extraction, minification (default)
    #[default]
    Production,
}

impl Mode {
    /// Profile key used for mode-specific overrides in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }

    /// Capability row for this mode.
    pub const fn capabilities(self) -> ModeCapabilities {
        match self {
            Mode::Development => DEVELOPMENT,
            Mode::Production => PRODUCTION,
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!("Invalid mode: {other}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How output filenames are hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStrategy {
    /// 64-bit non-cryptographic hash (seahash)
    Fast,
    /// SHA-256 of the serialized bytes
    Content,
}

/// What the `style` transform step does with stylesheet content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleHandling {
    /// Inject a `<style>` element at module evaluation
    Inject,
    /// Route CSS to a per-chunk stylesheet file
    Extract,
}

/// How module keys appear in emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleIds {
    /// Root-relative paths (`./src/index.js`)
    Named,
    /// Short hash of the root-relative path
    Hashed,
}

/// Where the module-registry bootstrap code lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeChunk {
    /// Prepended to every entry chunk
    #[default]
    Inline,
    /// One `runtime` chunk loaded before all others
    Single,
}

/// One row of the mode capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCapabilities {
    pub hash: HashStrategy,
    pub source_maps: bool,
    pub style: StyleHandling,
    pub minify: bool,
    pub module_ids: ModuleIds,
    pub vendor_split: bool,
    pub runtime_chunk: RuntimeChunk,
}

const DEVELOPMENT: ModeCapabilities = ModeCapabilities {
    hash: HashStrategy::Fast,
    source_maps: true,
    style: StyleHandling::Inject,
    minify: false,
    module_ids: ModuleIds::Named,
    vendor_split: false,
    runtime_chunk: RuntimeChunk::Inline,
};

const PRODUCTION: ModeCapabilities = ModeCapabilities {
    hash: HashStrategy::Content,
    source_maps: false,
    style: StyleHandling::Extract,
    minify: true,
    module_ids: ModuleIds::Hashed,
    vendor_split: true,
    runtime_chunk: RuntimeChunk::Single,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("development".parse::<Mode>().unwrap(), Mode::Development);
        assert_eq!("DEV".parse::<Mode>().unwrap(), Mode::Development);
        assert_eq!("production".parse::<Mode>().unwrap(), Mode::Production);
        assert!("staging".parse::<Mode>().is_err());
    }

    #[test]
    fn test_capability_rows_differ_only_in_parameters() {
        let dev = Mode::Development.capabilities();
        let prod = Mode::Production.capabilities();

        assert_eq!(dev.hash, HashStrategy::Fast);
        assert!(dev.source_maps);
        assert_eq!(dev.style, StyleHandling::Inject);

        assert_eq!(prod.hash, HashStrategy::Content);
        assert!(prod.minify);
        assert_eq!(prod.style, StyleHandling::Extract);
        assert_eq!(prod.runtime_chunk, RuntimeChunk::Single);
    }
}
