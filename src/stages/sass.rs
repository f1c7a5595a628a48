//! Sass stage: compile, then prefix and minify like plain styles.

use super::styles::finish_css;
use super::{collect_sources, record_write, write_output};
use crate::build::{BuildContext, FileFailure, StageReport};
use crate::config::{Category, StylesConfig};
use std::path::Path;
use tracing::debug;

/// Whether a Sass source is a partial (`_name.scss`), only used via imports.
pub fn is_partial(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('_'))
}

/// Compile one Sass file to finished CSS.
fn process_file(path: &Path, base: &Path, config: &StylesConfig) -> Result<String, FileFailure> {
    let options = grass::Options::default().load_path(base);
    let compiled = grass::from_path(path, &options)
        .map_err(|e| FileFailure::new(path.to_path_buf(), "sass", e.to_string()))?;
    finish_css(&compiled, &path.to_string_lossy(), config)
        .map_err(|(step, msg)| FileFailure::new(path.to_path_buf(), step, msg))
}

/// Whether `rel` is the merged file the styles stage owns in its directory.
///
/// Only possible when both stages write to the same destination.
fn shadows_merged_styles(ctx: &BuildContext, rel: &Path) -> bool {
    ctx.dest_dir(Category::SassStyles) == ctx.dest_dir(Category::Styles)
        && rel.file_name().and_then(|n| n.to_str())
            == Some(format!("{}.css", ctx.config().styles.basename).as_str())
}

/// Run the Sass stage. Each non-partial source becomes `<rel>.css`.
///
/// A source whose output would overwrite the merged styles file is reported
/// as a failure and not written.
pub fn run(ctx: &BuildContext) -> StageReport {
    let mut report = StageReport::new(Category::SassStyles.task_name());
    let Some(sources) = collect_sources(ctx, Category::SassStyles, &mut report) else {
        return report;
    };

    let config = &ctx.config().styles;
    let dest = ctx.dest_dir(Category::SassStyles);

    for source in sources.files.iter().filter(|s| !is_partial(s)) {
        let rel = sources.relative(source).with_extension("css");
        if shadows_merged_styles(ctx, &rel) {
            report.add_failure(FileFailure::new(
                source.clone(),
                "write",
                format!(
                    "output {} collides with the merged styles file; rename the source",
                    rel.display()
                ),
            ));
            continue;
        }
        match process_file(source, sources.glob.base(), config) {
            Ok(css) => {
                debug!("sassStyles: {}", rel.display());
                let result = write_output(&dest, &rel, css.as_bytes());
                record_write(&mut report, Some(source), result);
            }
            Err(failure) => report.add_failure(failure),
        }
    }

    report
}
