//! # bale-graph
//!
//! Pure data for module dependency graphs: identities, nodes, import edges,
//! side artifacts and the [`ModuleGraph`] arena, plus the [`Runtime`]
//! filesystem abstraction the bundler performs all I/O through.
//!
//! ```rust
//! use bale_graph::{EdgeTarget, ImportEdge, ImportKind, ModuleGraph, ModuleId, ModuleNode};
//!
//! let a = ModuleId::new("/app/src/a.js").unwrap();
//! let b = ModuleId::new("/app/src/b.js").unwrap();
//!
//! let mut graph = ModuleGraph::new();
//! graph.add_entry("app", a.clone());
//! graph
//!     .add_module(
//!         ModuleNode::builder(a.clone())
//!             .import(ImportEdge {
//!                 specifier: "./b".into(),
//!                 kind: ImportKind::Static,
//!                 target: EdgeTarget::Module { id: b.clone() },
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//! graph.add_module(ModuleNode::builder(b.clone()).build()).unwrap();
//!
//! assert_eq!(graph.dependents(&b), vec![&a]);
//! ```

pub mod error;
pub mod graph;
pub mod module;
pub mod module_id;
pub mod package;
pub mod runtime;

pub use error::GraphError;
pub use graph::ModuleGraph;
pub use module::{
    EdgeTarget, ImportEdge, ImportKind, ModuleMeta, ModuleNode, ModuleNodeBuilder, SideArtifact,
};
pub use module_id::{ModuleId, ModuleIdError, VIRTUAL_PREFIX};
pub use package::{extract_package_name, installed_package, vendor_chunk_name};

pub use runtime::native::NativeRuntime;
pub use runtime::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[cfg(any(test, feature = "test-utils"))]
pub use runtime::memory::MemoryRuntime;

#[cfg(all(test, feature = "proptest"))]
mod property_tests;
