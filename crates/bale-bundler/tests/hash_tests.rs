//! Content-hashed file names.

mod helpers;

use bale_bundler::{FileKind, Mode};
use helpers::*;

const FILES: &[(&str, &str)] = &[
    ("src/index.js", "import a from './a';\nimport b from './b';\nconsole.log(a + b);"),
    ("src/a.js", "import c from './c';\nexport default c * 2;"),
    ("src/b.js", "import c from './c';\nexport default c * 3;"),
    ("src/c.js", "export default 7;"),
];

fn chunk_files(report: &bale_bundler::BuildReport) -> Vec<(String, String)> {
    report
        .chunks
        .iter()
        .map(|chunk| (chunk.name.clone(), chunk.file.clone()))
        .collect()
}

#[tokio::test]
async fn identical_input_gives_identical_output() {
    let first = project(FILES);
    let second = project(FILES);
    let a = build(options(Mode::Production), &first).await;
    let b = build(options(Mode::Production), &second).await;
    assert_success(&a);
    assert_success(&b);

    assert_eq!(chunk_files(&a), chunk_files(&b));
    assert_eq!(first.files_under("/app/dist"), second.files_under("/app/dist"));
    for file in first.files_under("/app/dist") {
        assert_eq!(first.get(&file), second.get(&file), "{}", file.display());
    }
}

#[tokio::test]
async fn production_names_carry_the_content_hash() {
    let runtime = project(FILES);
    let report = build(options(Mode::Production), &runtime).await;
    assert_success(&report);

    for chunk in &report.chunks {
        assert_eq!(chunk.hash.len(), 16);
        assert_eq!(chunk.file, format!("{}.{}.js", chunk.name, chunk.hash));
        assert!(chunk.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert!(report.files.iter().any(|f| f.kind == FileKind::Manifest && f.path == "manifest.json"));
}

#[tokio::test]
async fn changing_a_shared_module_renames_only_the_shared_chunk() {
    let runtime = project(FILES);
    let before = build(options(Mode::Production), &runtime).await;
    assert_success(&before);

    runtime.insert("/app/src/c.js", "export default 8;");
    let after = build(options(Mode::Production), &runtime).await;
    assert_success(&after);

    for (old, new) in before.chunks.iter().zip(&after.chunks) {
        assert_eq!(old.name, new.name);
        if old.name == "shared" {
            assert_ne!(old.file, new.file);
        } else {
            assert_eq!(old.file, new.file, "{} was renamed", old.name);
        }
    }
}

#[tokio::test]
async fn hash_length_is_configurable() {
    let runtime = project(FILES);
    let mut options = options(Mode::Production);
    options.output.hash_length = 8;
    let report = build(options, &runtime).await;
    assert_success(&report);

    let app = report.chunk("app").unwrap();
    assert_eq!(app.hash.len(), 8);
    assert_eq!(app.file, format!("app.{}.js", app.hash));
}

#[tokio::test]
async fn custom_filename_template() {
    let runtime = project(FILES);
    let mut options = options(Mode::Development);
    options.output.filename = "js/[id]-[name].js".into();
    let report = build(options, &runtime).await;
    assert_success(&report);

    assert_eq!(report.chunk("shared").unwrap().file, "js/0-shared.js");
    assert_eq!(report.chunk("app").unwrap().file, "js/1-app.js");
    assert!(output(&runtime, "js/1-app.js").contains("__bale_chunks__"));
}

#[tokio::test]
async fn unknown_filename_placeholder_fails_the_build() {
    let runtime = project(FILES);
    let mut options = options(Mode::Development);
    options.output.filename = "[name].[chunkhash].js".into();
    let report = build(options, &runtime).await;

    assert!(!report.is_success());
    assert!(report.chunks.is_empty());
}
