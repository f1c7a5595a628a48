//! CLI integration tests
//!
//! Run the built binary inside temporary projects and check exit codes and
//! generated files.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn assetflow(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_assetflow"))
        .current_dir(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute assetflow")
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_list_shows_every_task() {
    let temp = TempDir::new().unwrap();
    let output = assetflow(temp.path(), &["--list"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "clean",
        "cleanImages",
        "cleanAll",
        "styles",
        "sassStyles",
        "scripts",
        "images",
        "templates",
        "serveEjs",
        "serve",
        "watch",
        "build",
        "default",
    ] {
        assert!(stdout.contains(name), "missing {} in:\n{}", name, stdout);
    }
}

#[test]
fn test_unknown_task_is_invalid_argument() {
    let temp = TempDir::new().unwrap();
    let output = assetflow(temp.path(), &["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("frobnicate"));
}

#[test]
fn test_styles_task_writes_output() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "public/stylesheets/site.css", ".site { color: red; }");

    let output = assetflow(temp.path(), &["styles"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let css = fs::read_to_string(temp.path().join("assets/stylesheets/styles.css")).unwrap();
    assert_eq!(css, ".site{color:red}");
}

#[test]
fn test_config_file_and_out_override() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "assetflow.toml", "[scripts]\nbundle = \"main.min.js\"\n");
    write(temp.path(), "public/javascripts/a.js", "var a = 1;");

    let output = assetflow(temp.path(), &["scripts", "--out", "dist"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(temp.path().join("dist/main.min.js").is_file());
    assert!(!temp.path().join("assets").exists());
}

#[test]
fn test_invalid_config_fails() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "assetflow.toml", "[images]\njpeg_quality = 0\n");

    let output = assetflow(temp.path(), &["images"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("jpeg_quality"));
}

#[test]
fn test_strict_turns_failures_into_exit_code() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "public/javascripts/broken.js", "function (");

    let lenient = assetflow(temp.path(), &["scripts"]);
    assert!(lenient.status.success());

    let strict = assetflow(temp.path(), &["scripts", "--strict"]);
    assert_eq!(strict.status.code(), Some(1));
}

#[test]
fn test_json_report() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "views/index.jinja", "<p>{{ 2 * 3 }}</p>");

    let output = assetflow(temp.path(), &["templates", "--json"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["tasks"][0], "templates");
    assert_eq!(report["stages"][0]["stage"], "templates");
    assert_eq!(report["stages"][0]["outputs"].as_array().unwrap().len(), 1);
    assert_eq!(fs::read_to_string(temp.path().join("assets/index.html")).unwrap(), "<p>6</p>");
}
