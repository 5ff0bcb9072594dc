//! Tests for default values.

use bale_config::{
    BaleConfig, BundleOptions, ErrorPolicy, HashStrategy, Mode, StyleHandling,
};
use std::path::PathBuf;

#[test]
fn bale_config_defaults() {
    let config = BaleConfig::default();
    assert!(config.bundle.entries.is_empty());
    assert!(config.profiles.is_empty());
    assert!(config.settings.log_level.is_none());
}

#[test]
fn bundle_options_defaults() {
    let opts = BundleOptions::default();
    assert_eq!(opts.mode, Mode::Production);
    assert_eq!(opts.output.dir, PathBuf::from("dist"));
    assert_eq!(opts.output.filename, "[name].[hash].js");
    assert_eq!(opts.output.css_filename, "[name].[hash].css");
    assert_eq!(opts.output.manifest, "manifest.json");
    assert_eq!(opts.output.hash_length, 16);
    assert_eq!(
        opts.resolve.extensions,
        vec![".js", ".mjs", ".json", ".css", ".styl"]
    );
    assert_eq!(opts.resolve.modules, vec!["node_modules"]);
    assert_eq!(opts.optimization.split_chunks.min_chunks, 1);
    assert_eq!(opts.error_policy, ErrorPolicy::CollectAll);
    assert!(!opts.clean);
    assert!(opts.html.is_none());
    assert_eq!(opts.rules.len(), 4);
}

#[test]
fn missing_sections_take_defaults() {
    let opts = BundleOptions::from_value(serde_json::json!({
        "entries": { "app": "./a.js" },
        "output": { "dir": "out" }
    }))
    .unwrap();

    assert_eq!(opts.output.dir, PathBuf::from("out"));
    assert_eq!(opts.output.filename, "[name].[hash].js");
    assert_eq!(opts.capabilities().hash, HashStrategy::Content);
    assert_eq!(opts.capabilities().style, StyleHandling::Extract);
}
