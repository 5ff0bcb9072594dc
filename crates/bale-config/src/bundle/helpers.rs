use std::path::PathBuf;

// Helper defaults
pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

pub(crate) fn default_filename() -> String {
    "[name].[hash].js".to_string()
}

pub(crate) fn default_css_filename() -> String {
    "[name].[hash].css".to_string()
}

pub(crate) fn default_asset_filename() -> String {
    "[name].[hash:8].[ext]".to_string()
}

pub(crate) fn default_manifest() -> String {
    "manifest.json".to_string()
}

pub(crate) fn default_hash_length() -> usize {
    16
}

pub(crate) fn default_extensions() -> Vec<String> {
    [".js", ".mjs", ".json", ".css", ".styl"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub(crate) fn default_modules() -> Vec<String> {
    vec!["node_modules".to_string()]
}

pub(crate) fn default_main_fields() -> Vec<String> {
    vec!["module".to_string(), "main".to_string()]
}

pub(crate) fn default_min_chunks() -> usize {
    1
}

pub(crate) fn default_vendor_prefix() -> String {
    "npm.".to_string()
}

pub(crate) fn default_shared_name() -> String {
    "shared".to_string()
}

pub(crate) fn default_runtime_name() -> String {
    "runtime".to_string()
}

pub(crate) fn default_html_filename() -> String {
    "index.html".to_string()
}

pub(crate) fn default_lang() -> String {
    "en".to_string()
}

pub(crate) fn default_inline_limit() -> u64 {
    10 * 1024
}
