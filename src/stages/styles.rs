//! Plain CSS stage: vendor-prefix, minify, merge per directory.

use super::{collect_sources, record_write, write_output};
use crate::build::{BuildContext, FileFailure, StageReport};
use crate::config::{BrowserTargets, Category, StylesConfig};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Convert configured browser major versions into prefixing targets.
pub fn browser_targets(config: &BrowserTargets) -> Targets {
    if config.is_empty() {
        return Targets::default();
    }

    let version = |v: Option<u32>| v.map(|major| major << 16);
    Targets::from(Browsers {
        android: version(config.android),
        chrome: version(config.chrome),
        edge: version(config.edge),
        firefox: version(config.firefox),
        ie: version(config.ie),
        ios_saf: version(config.ios_saf),
        opera: version(config.opera),
        safari: version(config.safari),
        samsung: version(config.samsung),
    })
}

/// Prefix and (optionally) minify a stylesheet.
///
/// On error returns the failing step name and the error text.
pub fn finish_css(
    code: &str,
    filename: &str,
    config: &StylesConfig,
) -> Result<String, (&'static str, String)> {
    let targets = browser_targets(&config.targets);

    let mut sheet = StyleSheet::parse(
        code,
        ParserOptions { filename: filename.to_string(), ..ParserOptions::default() },
    )
    .map_err(|e| ("prefix", e.to_string()))?;

    sheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| ("prefix", e.to_string()))?;

    let printed = sheet
        .to_css(PrinterOptions { minify: config.minify, targets, ..PrinterOptions::default() })
        .map_err(|e| ("minify", e.to_string()))?;

    Ok(printed.code)
}

/// Read and finish one CSS file.
fn process_file(path: &Path, config: &StylesConfig) -> Result<String, FileFailure> {
    let code = fs::read_to_string(path)
        .map_err(|e| FileFailure::new(path.to_path_buf(), "read", e.to_string()))?;
    finish_css(&code, &path.to_string_lossy(), config)
        .map_err(|(step, msg)| FileFailure::new(path.to_path_buf(), step, msg))
}

/// Run the styles stage.
///
/// Sources sharing a directory are merged, in sorted order, into one
/// `<dir>/<basename>.css` under the destination.
pub fn run(ctx: &BuildContext) -> StageReport {
    let mut report = StageReport::new(Category::Styles.task_name());
    let Some(sources) = collect_sources(ctx, Category::Styles, &mut report) else {
        return report;
    };

    let config = &ctx.config().styles;
    let dest = ctx.dest_dir(Category::Styles);

    let mut groups: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    for source in &sources.files {
        let rel = sources.relative(source);
        let dir = rel.parent().map(Path::to_path_buf).unwrap_or_default();
        match process_file(source, config) {
            Ok(css) => {
                debug!("styles: {}", rel.display());
                groups.entry(dir).or_default().push(css);
            }
            Err(failure) => report.add_failure(failure),
        }
    }

    for (dir, parts) in groups {
        let rel = dir.join(format!("{}.css", config.basename));
        let result = write_output(&dest, &rel, parts.join("\n").as_bytes());
        record_write(&mut report, None, result);
    }

    report
}
