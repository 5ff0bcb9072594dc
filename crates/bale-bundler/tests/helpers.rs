//! Shared test utilities for bale-bundler integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bale_bundler::{BuildReport, BundleOptions, Bundler, Mode};
use bale_graph::MemoryRuntime;

pub const ROOT: &str = "/app";

/// An in-memory project rooted at `/app`; paths are relative to the root.
pub fn project(files: &[(&str, &str)]) -> Arc<MemoryRuntime> {
    let runtime = MemoryRuntime::new(ROOT);
    for (path, content) in files {
        runtime.insert(format!("{ROOT}/{path}"), content);
    }
    Arc::new(runtime)
}

pub fn options(mode: Mode) -> BundleOptions {
    BundleOptions::default()
        .with_entry("app", "src/index")
        .with_mode(mode)
}

pub async fn build(options: BundleOptions, runtime: &Arc<MemoryRuntime>) -> BuildReport {
    let mut bundler = Bundler::new(options, runtime.clone()).unwrap();
    bundler.build().await
}

/// Contents of an emitted file, relative to `/app/dist`.
pub fn output(runtime: &MemoryRuntime, file: &str) -> String {
    let bytes = runtime
        .get(format!("{ROOT}/dist/{file}"))
        .unwrap_or_else(|| panic!("{file} was not written"));
    String::from_utf8(bytes).unwrap()
}

/// JavaScript of the chunk named `name`.
pub fn chunk_code(runtime: &MemoryRuntime, report: &BuildReport, name: &str) -> String {
    let chunk = report
        .chunk(name)
        .unwrap_or_else(|| panic!("no chunk named {name}"));
    output(runtime, &chunk.file)
}

pub fn chunk_names(report: &BuildReport) -> Vec<&str> {
    report.chunks.iter().map(|c| c.name.as_str()).collect()
}

pub fn assert_success(report: &BuildReport) {
    assert!(
        report.is_success(),
        "build failed in {:?}: {:#?}",
        report.state,
        report.diagnostics
    );
}
