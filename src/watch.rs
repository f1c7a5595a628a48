//! Watch mode for automatic rebuilds on file changes
//!
//! Watches the base directory of every category glob with debouncing. Each
//! batch of changes re-runs only the stages whose glob matched, in a task of
//! its own, and then (in serve mode) pushes a reload to connected browsers.

use crate::build::{
    executor, normalize_path, reporter, BuildContext, DiscoveryError, RunReport, SourceGlob,
};
use crate::config::Category;
use crate::serve::ReloadHub;
use futures::future::join_all;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// A category glob is invalid
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Tracks files with errors across rebuilds for recovery detection
///
/// Failures are kept per stage. A rebuild only settles the stages it ran;
/// files failing in other stages stay tracked.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files that had errors in the last run of each stage
    files_with_errors: HashMap<String, HashSet<PathBuf>>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a new run, returns the files that are now fixed
    pub fn update(&mut self, report: &RunReport) -> Vec<PathBuf> {
        let mut fixed = Vec::new();
        for stage in &report.stages {
            let current: HashSet<PathBuf> =
                stage.failures.iter().filter_map(|f| f.path.clone()).collect();
            if let Some(previous) = self.files_with_errors.get(&stage.stage) {
                fixed.extend(previous.difference(&current).cloned());
            }
            if current.is_empty() {
                self.files_with_errors.remove(&stage.stage);
            } else {
                self.files_with_errors.insert(stage.stage.clone(), current);
            }
        }

        fixed.sort();
        fixed.dedup();
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.values().map(HashSet::len).sum()
    }
}

/// Which category globs a changed path belongs to.
#[derive(Debug)]
pub struct WatchSet {
    root: PathBuf,
    entries: Vec<(Category, Vec<SourceGlob>)>,
    excluded: Vec<PathBuf>,
}

impl WatchSet {
    /// Compile the globs of `categories`.
    ///
    /// Each glob is also compiled against the canonical project root, since
    /// the platform watcher may report resolved paths.
    pub fn new(ctx: &BuildContext, categories: &[Category]) -> Result<Self, DiscoveryError> {
        let root = ctx.project_root();
        let canonical = std::fs::canonicalize(root).ok().filter(|c| c != root);

        let mut entries = Vec::new();
        for &category in categories {
            let src = &ctx.config().paths.get(category).src;
            let mut globs = vec![SourceGlob::new(root, src)?];
            if let Some(canonical) = &canonical {
                globs.push(SourceGlob::new(canonical, src)?);
            }
            entries.push((category, globs));
        }

        let out = ctx.out_dir();
        let mut excluded = vec![out.clone()];
        if let Some(canonical) = &canonical {
            if let Ok(rest) = out.strip_prefix(root) {
                excluded.push(canonical.join(rest));
            }
        }

        Ok(Self { root: normalize_path(root), entries, excluded })
    }

    /// Directories to watch recursively.
    ///
    /// A missing base inside the project is replaced by its nearest existing
    /// ancestor below the project root. A missing base with no such ancestor,
    /// or outside the project, is skipped. Nested roots are dropped in favor
    /// of their parent.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for (category, globs) in &self.entries {
            let Some(glob) = globs.first() else { continue };
            match watch_root(glob.base(), &self.root) {
                Some(root) => roots.push(root),
                None => warn!(
                    "Not watching {}: {} does not exist",
                    category,
                    glob.base().display()
                ),
            }
        }
        roots.sort();
        roots.dedup();

        let mut result: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !result.iter().any(|r| root.starts_with(r)) {
                result.push(root);
            }
        }
        result
    }

    /// Categories whose glob matches any of `paths`. Output files never match.
    pub fn categories_for(&self, paths: &[PathBuf]) -> BTreeSet<Category> {
        let mut categories = BTreeSet::new();
        for path in paths {
            if self.excluded.iter().any(|x| path.starts_with(x)) {
                continue;
            }
            for (category, globs) in &self.entries {
                if globs.iter().any(|g| g.is_match(path)) {
                    categories.insert(*category);
                }
            }
        }
        categories
    }
}

/// Directory to watch for a glob base, never the project root or above.
fn watch_root(base: &Path, project_root: &Path) -> Option<PathBuf> {
    if base.is_dir() {
        return Some(base.to_path_buf());
    }
    if !base.starts_with(project_root) {
        return None;
    }
    base.ancestors()
        .take_while(|p| *p != project_root)
        .find(|p| p.is_dir())
        .map(Path::to_path_buf)
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Rebuild `categories` and, if a hub is given, notify browsers afterwards.
pub async fn rebuild(
    ctx: Arc<BuildContext>,
    categories: BTreeSet<Category>,
    hub: Option<ReloadHub>,
    tracker: Arc<Mutex<ErrorTracker>>,
) -> RunReport {
    if ctx.config().watch.clear_screen {
        clear_screen();
    }

    let start = Instant::now();
    let names: Vec<&str> = categories.iter().map(|c| c.task_name()).collect();
    info!("Rebuilding {}...", names.join(", "));

    let mut run = RunReport::new();
    run.tasks = names.iter().map(|n| n.to_string()).collect();
    let stages = categories.iter().map(|&c| executor::run_stage_blocking(ctx.clone(), c));
    for report in join_all(stages).await {
        reporter::report_stage(&report);
        run.add_stage(report);
    }
    let run = run.with_duration(start.elapsed());

    for fixed in tracker.lock().await.update(&run) {
        info!("Fixed: {}", fixed.display());
    }

    if let Some(hub) = hub {
        let clients = hub.notify(&names.join(","));
        debug!("Reload pushed to {} client(s)", clients);
    }

    info!("Rebuild finished in {}", reporter::format_duration(run.total_duration));
    run
}

/// Start watching every category glob.
///
/// Returns the handle of the task that owns the watcher; aborting it stops
/// watching. Rebuilds already in flight run to completion.
pub fn spawn(ctx: Arc<BuildContext>, hub: Option<ReloadHub>) -> Result<JoinHandle<()>, WatchError> {
    let set = WatchSet::new(&ctx, &Category::ALL)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
    let debounce = Duration::from_millis(ctx.config().watch.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })
    .map_err(WatchError::WatcherInit)?;

    let roots = set.roots();
    for root in &roots {
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: root.clone(), source })?;
        info!("Watching {} for changes...", root.display());
    }

    let tracker = Arc::new(Mutex::new(ErrorTracker::new()));
    let handle = tokio::spawn(async move {
        let _debouncer = debouncer;
        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    let categories = set.categories_for(&paths);
                    if categories.is_empty() {
                        continue;
                    }
                    for path in &paths {
                        debug!("Changed: {}", path.display());
                    }
                    tokio::spawn(rebuild(ctx.clone(), categories, hub.clone(), tracker.clone()));
                }
                Err(error) => {
                    // Non-fatal; keep watching
                    warn!("Watch error: {:?}", error);
                }
            }
        }
    });

    Ok(handle)
}
