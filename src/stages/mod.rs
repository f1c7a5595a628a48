//! Per-category build stages.
//!
//! Each stage reads the files matching its category glob, runs them through
//! its processing steps and writes the results under the category's
//! destination. A failing file is recorded in the [`StageReport`] and the
//! stage moves on to the next one.

pub mod images;
pub mod output;
pub mod quantize;
pub mod sass;
pub mod scripts;
pub mod styles;
pub mod templates;

pub use output::write_output;

use crate::build::{BuildContext, FileFailure, SourceGlob, StageReport};
use crate::config::Category;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Run the stage for `category` once.
pub fn run_stage(ctx: &BuildContext, category: Category) -> StageReport {
    info!("Starting '{}'...", category);
    let start = Instant::now();

    let mut report = match category {
        Category::Styles => styles::run(ctx),
        Category::SassStyles => sass::run(ctx),
        Category::Scripts => scripts::run(ctx),
        Category::Images => images::run(ctx),
        Category::Templates => templates::run(ctx),
    };

    report.duration = start.elapsed();
    report
}

/// Matched inputs of a stage.
#[derive(Debug)]
pub(crate) struct Sources {
    pub glob: SourceGlob,
    pub files: Vec<PathBuf>,
}

impl Sources {
    /// Path of a source relative to the glob base.
    pub fn relative(&self, path: &Path) -> PathBuf {
        self.glob
            .relative(path)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.file_name().map(PathBuf::from).unwrap_or_default())
    }
}

/// Discover a category's inputs, recording problems in `report`.
///
/// Returns `None` when there is nothing to process.
pub(crate) fn collect_sources(
    ctx: &BuildContext,
    category: Category,
    report: &mut StageReport,
) -> Option<Sources> {
    let glob = match ctx.source_glob(category) {
        Ok(glob) => glob,
        Err(e) => {
            report.add_failure(FileFailure::new(None::<PathBuf>, "read", e.to_string()));
            return None;
        }
    };

    let discovered = glob.discover(Some(&ctx.out_dir()));
    for failure in discovered.unreadable {
        report.add_failure(failure);
    }

    if discovered.files.is_empty() {
        report.add_warning(format!("no files matched {}", glob));
        return None;
    }

    debug!("{}: {} file(s) matched {}", category, discovered.files.len(), glob);
    report.inputs = discovered.files.len();
    Some(Sources { glob, files: discovered.files })
}

/// Record the result of writing one output.
pub(crate) fn record_write(
    report: &mut StageReport,
    source: Option<&Path>,
    result: std::io::Result<PathBuf>,
) {
    match result {
        Ok(path) => report.add_output(path),
        Err(e) => report.add_failure(FileFailure::new(
            source.map(Path::to_path_buf),
            "write",
            e.to_string(),
        )),
    }
}
