//! Incremental rebuild support.
//!
//! The previous build's graph is kept in memory by the orchestrator. A rebuild
//! hashes the paths a watcher reported, classifies them with a
//! [`ChangeDetector`], and hands the affected set to the graph builder, which
//! reuses every other node unchanged.

pub mod changes;

pub use changes::{ChangeDetector, ChangeSet};
