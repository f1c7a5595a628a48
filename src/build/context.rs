//! Build context containing configuration and paths for a build.

use crate::build::discovery::{DiscoveryError, SourceGlob};
use crate::config::{AssetflowConfig, Category};
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// Created once at start-up and shared (behind an `Arc`) by every stage,
/// the watcher and the dev server. Nothing in it changes after construction.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: AssetflowConfig,
    /// Project root directory (where assetflow.toml is located)
    project_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: AssetflowConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AssetflowConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the output root (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Destination directory of a category (resolved to absolute path).
    pub fn dest_dir(&self, category: Category) -> PathBuf {
        self.resolve_path(&self.config.paths.get(category).dest)
    }

    /// Compiled source glob of a category.
    pub fn source_glob(&self, category: Category) -> Result<SourceGlob, DiscoveryError> {
        SourceGlob::new(&self.project_root, &self.config.paths.get(category).src)
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }
}
