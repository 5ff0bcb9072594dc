//! Content digests.
//!
//! Output names use the strategy from the mode capability table: seahash for
//! fast development rebuilds, SHA-256 for production cache busting. Module
//! content is always tracked with BLAKE3 for change detection.

use bale_config::HashStrategy;
use sha2::{Digest, Sha256};

/// Hex digest of `bytes` under `strategy`.
pub fn digest(strategy: HashStrategy, bytes: &[u8]) -> String {
    match strategy {
        HashStrategy::Fast => format!("{:016x}", seahash::hash(bytes)),
        HashStrategy::Content => hash_content(bytes),
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// BLAKE3 of raw module bytes, used to detect changes between builds.
pub fn module_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
