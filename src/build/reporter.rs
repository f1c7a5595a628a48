//! Error reporting for stages.
//!
//! Every failure a stage records ends up here. The reporter formats it into a
//! single diagnostic line and logs it; it never panics and never stops the
//! pipeline.

use crate::build::{FileFailure, StageReport};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Format a diagnostic for a failure inside a stage.
///
/// The message names the failing step, the stage and, when known, the path.
pub fn diagnostic(stage: &str, failure: &FileFailure) -> String {
    let mut msg = format!("Error from {} in {} task", failure.step, stage);
    if let Some(path) = &failure.path {
        msg.push_str(&format!(" ({})", path.display()));
    }
    msg.push_str(": ");
    msg.push_str(failure.message.trim_end());
    msg
}

/// Report a failure through the logger and return the formatted line.
pub fn report_failure(stage: &str, failure: &FileFailure) -> String {
    let msg = diagnostic(stage, failure);
    error!(stage, step = %failure.step, "{}", msg);
    msg
}

/// Log a finished stage: warnings, failures and a one-line summary.
pub fn report_stage(report: &StageReport) {
    for warning in &report.warnings {
        warn!(stage = %report.stage, "{}", warning);
    }
    for failure in &report.failures {
        report_failure(&report.stage, failure);
    }
    for output in &report.outputs {
        debug!(stage = %report.stage, "wrote {}", output.display());
    }

    if report.failures.is_empty() {
        info!(
            "Finished '{}' after {} ({} in, {} out)",
            report.stage,
            format_duration(report.duration),
            report.inputs,
            report.outputs.len()
        );
    } else {
        warn!(
            "Finished '{}' after {} with {} failed file(s)",
            report.stage,
            format_duration(report.duration),
            report.failures.len()
        );
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_diagnostic_with_path() {
        let failure = FileFailure::new(
            PathBuf::from("public/stylesheets/bad.css"),
            "prefix",
            "Unexpected token CloseCurlyBracket\n",
        );
        assert_eq!(
            diagnostic("styles", &failure),
            "Error from prefix in styles task (public/stylesheets/bad.css): \
             Unexpected token CloseCurlyBracket"
        );
    }

    #[test]
    fn test_diagnostic_without_path() {
        let failure = FileFailure::new(None::<PathBuf>, "read", "permission denied");
        assert_eq!(diagnostic("images", &failure), "Error from read in images task: permission denied");
    }

    #[test]
    fn test_report_failure_returns_diagnostic() {
        let failure = FileFailure::new(PathBuf::from("x.js"), "minify", "bad");
        assert!(report_failure("scripts", &failure).contains("scripts task"));
    }

    #[test]
    fn test_report_stage_does_not_panic() {
        let mut report = StageReport::new("styles");
        report.add_warning("nothing matched");
        report.add_failure(FileFailure::new(None::<PathBuf>, "write", ""));
        report_stage(&report);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
