//! Source file discovery for the build system.
//!
//! A source glob such as `../site/public/images/**/*.{png,jpg}` is split into
//! a literal base directory (`../site/public/images`, resolved against the
//! project root) and a pattern matched against paths relative to that base
//! (`**/*.{png,jpg}`). Only the base directory is walked.

use crate::build::FileFailure;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] globset::Error),
}

/// Files found by a discovery walk, plus the entries that could not be read.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Matching files, sorted
    pub files: Vec<PathBuf>,
    /// Directory entries the walk failed on
    pub unreadable: Vec<FileFailure>,
}

/// A compiled source glob anchored at a base directory.
#[derive(Debug, Clone)]
pub struct SourceGlob {
    raw: String,
    base: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
}

fn has_magic(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

impl SourceGlob {
    /// Compile `raw`, resolving its literal prefix against `root`.
    pub fn new(root: &Path, raw: &str) -> Result<Self, DiscoveryError> {
        let normalized = raw.replace('\\', "/");
        let parts: Vec<&str> = normalized.split('/').collect();

        // A pattern without wildcards still matches a single file: its parent
        // becomes the base.
        let split =
            parts.iter().position(|p| has_magic(p)).unwrap_or(parts.len().saturating_sub(1));
        let (literal, rest) = parts.split_at(split);

        let literal = literal.join("/");
        let base = if literal.is_empty() {
            normalize_path(root)
        } else if literal.starts_with('/') || Path::new(&literal).is_absolute() {
            normalize_path(Path::new(&literal))
        } else {
            normalize_path(&root.join(&literal))
        };
        let pattern = rest.join("/");

        let matcher = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| DiscoveryError::InvalidPattern(raw.to_string(), e))?
            .compile_matcher();

        Ok(Self { raw: raw.to_string(), base, pattern, matcher })
    }

    /// The glob as written in the configuration.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Directory the pattern is anchored at.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The wildcard part, relative to [`SourceGlob::base`].
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Path of `path` relative to the base, if it lies under it.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.base).ok()
    }

    /// Whether `path` (absolute, or relative to the same root) matches.
    pub fn is_match(&self, path: &Path) -> bool {
        self.relative(path).map(|rel| self.matcher.is_match(rel)).unwrap_or(false)
    }

    /// Whether a path relative to the base matches.
    pub fn is_match_relative(&self, rel: &Path) -> bool {
        self.matcher.is_match(rel)
    }

    /// Walk the base directory and collect matching files.
    ///
    /// Anything under `exclude` is skipped unless `exclude` contains the base
    /// itself. A missing base directory yields no files and no errors.
    pub fn discover(&self, exclude: Option<&Path>) -> Discovered {
        let mut discovered = Discovered::default();
        if !self.base.is_dir() {
            return discovered;
        }

        let exclude = exclude.filter(|x| !self.base.starts_with(x));

        let walker = WalkDir::new(&self.base)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| exclude.map_or(true, |x| !e.path().starts_with(x)));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_match(entry.path()) {
                        discovered.files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf);
                    discovered.unreadable.push(FileFailure::new(path, "read", e.to_string()));
                }
            }
        }

        discovered.files.sort();
        discovered
    }
}

impl std::fmt::Display for SourceGlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
///
/// Leading `..` components of a relative path are kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
