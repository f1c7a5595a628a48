//! Pipeline integration tests
//!
//! Drive the executor end to end over a temporary project laid out with the
//! default path table.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetflow::build::{BuildContext, CleanScope, Executor, Task, TaskRegistry};
use assetflow::config::{AssetflowConfig, Category};
use assetflow::stages::run_stage;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn create_test_file(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn create_png(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = image::RgbaImage::from_fn(16, 16, |x, y| {
        image::Rgba([(x * 16) as u8, (y * 16) as u8, 128, 255])
    });
    img.save(&path).unwrap();
}

fn context(root: &Path) -> BuildContext {
    BuildContext::new(AssetflowConfig::default(), root.to_path_buf())
}

/// Standard registry plus a `release` task that mirrors `build` without the
/// dev server, so a test run terminates.
fn release_executor(root: &Path) -> Executor {
    let mut registry = TaskRegistry::standard();
    registry
        .register(Task::parallel("assets", "", &["styles", "sassStyles", "scripts", "templates"]))
        .unwrap();
    registry.register(Task::series("release", "", &["cleanAll", "images", "assets"])).unwrap();
    Executor::new(Arc::new(context(root)), registry)
}

fn sample_project(root: &Path) {
    create_test_file(root, "public/stylesheets/a.css", b".a { color: red; }");
    create_test_file(root, "public/stylesheets/b.css", b".b { color: blue; }");
    create_test_file(root, "public/stylesheets/main.scss", b"$c: green; .m { color: $c; }");
    create_test_file(root, "public/javascripts/app/one.js", b"var one = 1 ** 2;");
    create_test_file(root, "public/javascripts/two.js", b"function two() { return 2; }");
    create_test_file(root, "views/index.jinja", b"<html><body>{{ 1 + 1 }}</body></html>");
    create_png(root, "public/images/logo.png");
}

fn sha256(path: &Path) -> Vec<u8> {
    Sha256::digest(fs::read(path).unwrap()).to_vec()
}

// ============================================================================
// Full pipeline
// ============================================================================

#[tokio::test]
async fn test_release_populates_missing_output_root() {
    let temp = TempDir::new().unwrap();
    sample_project(temp.path());
    assert!(!temp.path().join("assets").exists());

    let outcome = release_executor(temp.path()).run(&["release".to_string()]).await.unwrap();

    assert!(outcome.services.is_empty());
    assert!(outcome.report.is_success(), "{}", outcome.report.summary());
    let out = temp.path().join("assets");
    assert!(out.join("stylesheets/styles.css").is_file());
    assert!(out.join("stylesheets/main.css").is_file());
    assert!(out.join("app.js").is_file());
    assert!(out.join("index.html").is_file());
    assert!(out.join("images/logo.png").is_file());

    let names: Vec<_> = outcome.report.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(&names[..2], &["cleanAll", "images"]);
    assert_eq!(names.len(), 6);
}

#[tokio::test]
async fn test_release_twice_replaces_output() {
    let temp = TempDir::new().unwrap();
    sample_project(temp.path());
    create_test_file(temp.path(), "assets/stale.txt", b"old");

    let executor = release_executor(temp.path());
    executor.run(&["release".to_string()]).await.unwrap();
    assert!(!temp.path().join("assets/stale.txt").exists());

    let first = sha256(&temp.path().join("assets/app.js"));
    executor.run(&["release".to_string()]).await.unwrap();
    assert_eq!(first, sha256(&temp.path().join("assets/app.js")));
}

#[tokio::test]
async fn test_unknown_task_rejected_before_running() {
    let temp = TempDir::new().unwrap();
    sample_project(temp.path());

    let result = release_executor(temp.path()).run(&["styles".into(), "bogus".into()]).await;
    assert!(result.is_err());
    assert!(!temp.path().join("assets").exists());
}

// ============================================================================
// Stage properties
// ============================================================================

#[test]
fn test_selective_clean_is_idempotent() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "assets/app.js", b"x");
    create_test_file(temp.path(), "assets/stylesheets/styles.css", b"x");
    create_test_file(temp.path(), "assets/images/keep.png", b"x");

    let ctx = context(temp.path());
    let first = assetflow::build::clean::clean(&ctx, CleanScope::Selective);
    assert!(first.is_success());
    assert!(!temp.path().join("assets/app.js").exists());
    assert!(temp.path().join("assets/images/keep.png").exists());

    let second = assetflow::build::clean::clean(&ctx, CleanScope::Selective);
    assert!(second.is_success());
    assert!(second.failures.is_empty());
}

#[test]
fn test_outputs_stay_under_destination() {
    let temp = TempDir::new().unwrap();
    sample_project(temp.path());
    create_test_file(temp.path(), "views/nested/deep/page.jinja", b"<p>deep</p>");
    create_test_file(temp.path(), "public/stylesheets/sub/c.css", b".c { margin: 0; }");

    let ctx = context(temp.path());
    for category in Category::ALL {
        let report = run_stage(&ctx, category);
        let dest = ctx.dest_dir(category);
        assert!(!report.outputs.is_empty(), "{} wrote nothing", category);
        for output in &report.outputs {
            assert!(output.starts_with(&dest), "{} escaped {}", output.display(), dest.display());
        }
    }
}

#[test]
fn test_scripts_bundle_is_deterministic() {
    let temp = TempDir::new().unwrap();
    sample_project(temp.path());
    let ctx = context(temp.path());
    let bundle = temp.path().join("assets/app.js");

    run_stage(&ctx, Category::Scripts);
    let first = sha256(&bundle);
    fs::remove_file(&bundle).unwrap();
    run_stage(&ctx, Category::Scripts);
    assert_eq!(first, sha256(&bundle));
}

#[test]
fn test_corrupt_style_isolated() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "public/stylesheets/a.css", b".a { color: red; }");
    let bad =
        create_test_file(temp.path(), "public/stylesheets/bad.css", &[0xff, 0xfe, 0x00, 0x81]);
    create_test_file(temp.path(), "public/stylesheets/c.css", b".c { color: blue; }");

    let report = run_stage(&context(temp.path()), Category::Styles);

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.path.as_deref(), Some(bad.as_path()));
    assert!(failure.to_string().contains("bad.css"));

    let css = fs::read_to_string(temp.path().join("assets/stylesheets/styles.css")).unwrap();
    assert!(css.contains(".a{color:red}"));
    assert!(css.contains(".c{color:#00f}"));
}

#[test]
fn test_style_syntax_error_isolated() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "public/stylesheets/a.css", b".a { color: red; }");
    let bad = create_test_file(temp.path(), "public/stylesheets/bad.css", b"..a { color: red; }");
    create_test_file(temp.path(), "public/stylesheets/c.css", b".c { color: blue; }");

    let report = run_stage(&context(temp.path()), Category::Styles);

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.path.as_deref(), Some(bad.as_path()));
    assert_eq!(failure.step, "prefix");

    let css = fs::read_to_string(temp.path().join("assets/stylesheets/styles.css")).unwrap();
    assert_eq!(css, ".a{color:red}\n.c{color:#00f}");
}

#[test]
fn test_styles_in_one_directory_merge() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "public/stylesheets/a.css", b".a {\n  color: red;\n}\n");
    create_test_file(temp.path(), "public/stylesheets/b.css", b".b {\n  color: blue;\n}\n");

    let report = run_stage(&context(temp.path()), Category::Styles);
    assert_eq!(report.outputs.len(), 1);

    let css = fs::read_to_string(&report.outputs[0]).unwrap();
    assert_eq!(css, ".a{color:red}\n.b{color:#00f}");
}

#[test]
fn test_empty_glob_warns() {
    let temp = TempDir::new().unwrap();
    let report = run_stage(&context(temp.path()), Category::Images);
    assert!(report.is_success());
    assert!(report.outputs.is_empty());
    assert_eq!(report.warnings.len(), 1);
}
