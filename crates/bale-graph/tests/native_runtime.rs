//! `NativeRuntime` against a temporary directory.

use bale_graph::{ModuleId, NativeRuntime, Runtime, RuntimeError};
use tempfile::TempDir;

#[tokio::test]
async fn write_read_and_rename() {
    let temp = TempDir::new().unwrap();
    let runtime = NativeRuntime::new();
    let dist = temp.path().join("dist/js");

    runtime.create_dir(&dist, true).await.unwrap();
    assert!(runtime.is_dir(&dist));

    let staged = dist.join("app.js.tmp");
    let target = dist.join("app.js");
    runtime.write_file(&staged, b"console.log(1);").await.unwrap();
    runtime.rename(&staged, &target).await.unwrap();

    assert!(!runtime.exists(&staged));
    assert!(runtime.is_file(&target));
    assert_eq!(runtime.read_file(&target).await.unwrap(), b"console.log(1);");

    let metadata = runtime.metadata(&target).await.unwrap();
    assert_eq!(metadata.size, 15);
    assert!(metadata.is_file);
    assert!(metadata.modified.is_some());
}

#[tokio::test]
async fn missing_files_are_reported_as_not_found() {
    let temp = TempDir::new().unwrap();
    let runtime = NativeRuntime::new();
    let missing = temp.path().join("nope.js");

    match runtime.read_file(&missing).await {
        Err(RuntimeError::FileNotFound(path)) => assert_eq!(path, missing),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!runtime.exists(&missing));
}

#[tokio::test]
async fn directory_listing_and_removal() {
    let temp = TempDir::new().unwrap();
    let runtime = NativeRuntime::new();
    let out = temp.path().join("out");
    runtime.create_dir(&out.join("assets"), true).await.unwrap();
    runtime.write_file(&out.join("a.js"), b"a").await.unwrap();
    runtime.write_file(&out.join("assets/logo.png"), b"png").await.unwrap();

    let mut names = runtime.read_dir(&out).await.unwrap();
    names.sort();
    assert_eq!(names, ["a.js", "assets"]);

    runtime.remove_dir_all(&out).await.unwrap();
    assert!(!runtime.exists(&out));
}

#[tokio::test]
async fn module_ids_from_disk_paths_are_clean() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let id = ModuleId::new(root.join("src/./lib/../index.js")).unwrap();

    assert_eq!(id.as_path(), root.join("src/index.js"));
    assert_eq!(id.relative_to(root), "./src/index.js");
}
