//! Package names for installed modules and the chunk names derived from them.

use std::path::{Component, Path};

/// Extract the package name from a bare specifier or an installed subpath.
///
/// ```
/// use bale_graph::extract_package_name;
///
/// assert_eq!(extract_package_name("lodash/fp"), "lodash");
/// assert_eq!(extract_package_name("@babel/core/lib/index"), "@babel/core");
/// ```
pub fn extract_package_name(specifier: &str) -> &str {
    if specifier.is_empty() {
        return specifier;
    }

    if specifier.starts_with('@') {
        if let Some(first_slash) = specifier.find('/') {
            if let Some(second_slash) = specifier[first_slash + 1..].find('/') {
                return &specifier[..first_slash + 1 + second_slash];
            }
        }
        return specifier;
    }

    match specifier.find('/') {
        Some(slash_idx) => &specifier[..slash_idx],
        None => specifier,
    }
}

/// Owning package of a file under an installation directory.
///
/// Uses the segment after the *last* installation directory marker, so nested
/// installs (`node_modules/a/node_modules/b/x.js`) belong to `b`.
pub fn installed_package(path: &Path, install_dirs: &[String]) -> Option<String> {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let marker = parts
        .iter()
        .rposition(|part| install_dirs.iter().any(|dir| dir == part))?;

    let first = parts.get(marker + 1)?;
    if first.starts_with('@') {
        let second = parts.get(marker + 2)?;
        Some(format!("{first}/{second}"))
    } else {
        Some(first.clone())
    }
}

/// Vendor chunk name for a package: `npm.lodash`, `@s/p` → `npm.s+p`.
pub fn vendor_chunk_name(package: &str, prefix: &str) -> String {
    let flat = package.trim_start_matches('@').replace('/', "+");
    format!("{prefix}{flat}")
}
