//! Removal of generated output.
//!
//! Cleaning is idempotent: a path that is already gone is not an error. A path
//! that exists but cannot be removed becomes a failure in the stage report and
//! the remaining paths are still processed.

use crate::build::discovery::normalize_path;
use crate::build::{BuildContext, FileFailure, StageReport};
use crate::config::Category;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// What a clean run removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanScope {
    /// The configured `clean.selective` list
    Selective,
    /// The images destination directory
    Images,
    /// The entire output root
    All,
}

impl CleanScope {
    /// Task name for this scope.
    pub fn task_name(&self) -> &'static str {
        match self {
            CleanScope::Selective => "clean",
            CleanScope::Images => "cleanImages",
            CleanScope::All => "cleanAll",
        }
    }

    /// Patterns (relative to the project root, or absolute) this scope removes.
    pub fn patterns(&self, ctx: &BuildContext) -> Vec<String> {
        match self {
            CleanScope::Selective => ctx.config().clean.selective.clone(),
            CleanScope::Images => {
                vec![ctx.dest_dir(Category::Images).to_string_lossy().into_owned()]
            }
            CleanScope::All => vec![ctx.out_dir().to_string_lossy().into_owned()],
        }
    }
}

impl std::fmt::Display for CleanScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.task_name())
    }
}

/// Run a clean scope against the project.
pub fn clean(ctx: &BuildContext, scope: CleanScope) -> StageReport {
    let start = Instant::now();
    let patterns = scope.patterns(ctx);
    let mut report =
        clean_paths(ctx.project_root(), &patterns, ctx.config().clean.force, scope.task_name());
    report.duration = start.elapsed();
    report
}

/// Delete every path matching `patterns`.
///
/// Patterns may be plain paths or glob patterns. Matches that resolve outside
/// `root` (or to `root` itself) are refused unless `force` is set.
pub fn clean_paths(root: &Path, patterns: &[String], force: bool, stage: &str) -> StageReport {
    let mut report = StageReport::new(stage);
    report.inputs = patterns.len();
    let root = normalize_path(root);

    for pattern in patterns {
        for target in expand(&root, pattern, &mut report) {
            let target = normalize_path(&target);
            if !force && (!target.starts_with(&root) || target == root) {
                report.add_failure(FileFailure::new(
                    target,
                    "clean",
                    "refusing to delete a path outside the project root (set clean.force = true to allow)",
                ));
                continue;
            }

            match remove(&target) {
                Ok(true) => {
                    debug!("removed {}", target.display());
                    report.add_output(target);
                }
                Ok(false) => {}
                Err(e) => report.add_failure(FileFailure::new(target, "clean", e.to_string())),
            }
        }
    }

    report
}

fn has_magic(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Resolve a pattern to concrete paths. Plain paths are returned as-is.
fn expand(root: &Path, pattern: &str, report: &mut StageReport) -> Vec<PathBuf> {
    let path = Path::new(pattern);
    if !has_magic(pattern) {
        return vec![if path.is_absolute() { path.to_path_buf() } else { root.join(path) }];
    }

    let full = if path.is_absolute() {
        pattern.to_string()
    } else {
        format!("{}/{}", glob::Pattern::escape(&root.to_string_lossy()), pattern)
    };

    match glob::glob(&full) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    report.add_failure(FileFailure::new(
                        e.path().to_path_buf(),
                        "clean",
                        e.error().to_string(),
                    ));
                    None
                }
            })
            .collect(),
        Err(e) => {
            report.add_failure(FileFailure::new(PathBuf::from(pattern), "clean", e.to_string()));
            vec![]
        }
    }
}

/// Remove a file or directory tree. Returns `Ok(false)` if nothing was there.
fn remove(path: &Path) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let result = if meta.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetflowConfig;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn ctx(root: &Path) -> BuildContext {
        BuildContext::new(AssetflowConfig::default(), root.to_path_buf())
    }

    #[test]
    fn test_selective_clean_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "assets/stylesheets/styles.css");
        write(temp.path(), "assets/partials/nav.html");
        write(temp.path(), "assets/index.html");
        write(temp.path(), "assets/app.js");
        write(temp.path(), "assets/images/logo.png");

        let ctx = ctx(temp.path());
        let first = clean(&ctx, CleanScope::Selective);
        assert!(first.failures.is_empty(), "{:?}", first.failures);
        assert_eq!(first.outputs.len(), 4);
        assert!(!temp.path().join("assets/stylesheets").exists());
        assert!(!temp.path().join("assets/index.html").exists());
        assert!(temp.path().join("assets/images/logo.png").exists());

        let second = clean(&ctx, CleanScope::Selective);
        assert!(second.failures.is_empty());
        assert!(second.outputs.is_empty());
    }

    #[test]
    fn test_clean_images_scope() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "assets/images/a/b.png");
        write(temp.path(), "assets/app.js");

        let report = clean(&ctx(temp.path()), CleanScope::Images);
        assert_eq!(report.stage, "cleanImages");
        assert!(!temp.path().join("assets/images").exists());
        assert!(temp.path().join("assets/app.js").exists());
    }

    #[test]
    fn test_clean_all_on_missing_output() {
        let temp = TempDir::new().unwrap();
        let report = clean(&ctx(temp.path()), CleanScope::All);
        assert!(report.failures.is_empty());
        assert!(report.outputs.is_empty());
    }

    #[test]
    fn test_clean_refuses_outside_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        fs::create_dir_all(&root).unwrap();
        write(temp.path(), "elsewhere/keep.txt");

        let patterns = vec!["../elsewhere".to_string()];
        let report = clean_paths(&root, &patterns, false, "clean");
        assert_eq!(report.failures.len(), 1);
        assert!(temp.path().join("elsewhere/keep.txt").exists());

        let report = clean_paths(&root, &patterns, true, "clean");
        assert!(report.failures.is_empty());
        assert!(!temp.path().join("elsewhere").exists());
    }

    #[test]
    fn test_clean_refuses_project_root() {
        let temp = TempDir::new().unwrap();
        let report = clean_paths(temp.path(), &[".".to_string()], false, "cleanAll");
        assert_eq!(report.failures.len(), 1);
        assert!(temp.path().exists());
    }

    #[test]
    fn test_scope_names() {
        assert_eq!(CleanScope::Selective.to_string(), "clean");
        assert_eq!(CleanScope::Images.task_name(), "cleanImages");
        assert_eq!(CleanScope::All.task_name(), "cleanAll");
    }
}
