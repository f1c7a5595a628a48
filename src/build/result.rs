//! Build result types.
//!
//! Contains types for representing the outcome of stage and task runs.

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Every input was processed
    Success,
    /// Nothing matched, nothing was done
    Empty,
    /// At least one file failed
    Failed,
}

impl StageStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::Empty)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, StageStatus::Failed)
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Success => write!(f, "success"),
            StageStatus::Empty => write!(f, "empty"),
            StageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A single file (or path) that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// Offending path, when the error is tied to one
    pub path: Option<PathBuf>,
    /// Processing step that failed (`read`, `prefix`, `minify`, `write`, ...)
    pub step: String,
    /// Underlying error text
    pub message: String,
}

impl FileFailure {
    /// Create a failure record.
    pub fn new(
        path: impl Into<Option<PathBuf>>,
        step: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { path: path.into(), step: step.into(), message: message.into() }
    }
}

impl std::fmt::Display for FileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {} ({})", path.display(), self.message, self.step),
            None => write!(f, "{} ({})", self.message, self.step),
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Outcome of running one stage (or clean scope) once.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Task name of the stage
    pub stage: String,
    /// Number of inputs seen
    pub inputs: usize,
    /// Output files written
    pub outputs: Vec<PathBuf>,
    /// Per-file failures
    pub failures: Vec<FileFailure>,
    /// Warning messages (if any)
    pub warnings: Vec<String>,
    /// Stage duration
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl StageReport {
    /// Create an empty report for a stage.
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            inputs: 0,
            outputs: vec![],
            failures: vec![],
            warnings: vec![],
            duration: Duration::ZERO,
        }
    }

    /// Record an output file.
    pub fn add_output(&mut self, path: PathBuf) {
        self.outputs.push(path);
    }

    /// Record a per-file failure.
    pub fn add_failure(&mut self, failure: FileFailure) {
        self.failures.push(failure);
    }

    /// Record a warning.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Overall status of the stage.
    pub fn status(&self) -> StageStatus {
        if !self.failures.is_empty() {
            StageStatus::Failed
        } else if self.inputs == 0 && self.outputs.is_empty() {
            StageStatus::Empty
        } else {
            StageStatus::Success
        }
    }

    /// Check if this stage ran without failures.
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

/// Outcome of a complete task invocation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    /// Requested task names
    pub tasks: Vec<String>,
    /// Stage reports in completion order
    pub stages: Vec<StageReport>,
    /// Total duration
    #[serde(rename = "total_duration_ms", serialize_with = "as_millis")]
    pub total_duration: Duration,
}

impl RunReport {
    /// Create a new empty run report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage report.
    pub fn add_stage(&mut self, report: StageReport) {
        self.stages.push(report);
    }

    /// Append every stage of another report.
    pub fn extend(&mut self, other: RunReport) {
        self.stages.extend(other.stages);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get the number of outputs written across all stages.
    pub fn output_count(&self) -> usize {
        self.stages.iter().map(|s| s.outputs.len()).sum()
    }

    /// Get the number of per-file failures across all stages.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().map(|s| s.failures.len()).sum()
    }

    /// Check if the run finished without any failure.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.stages.iter().flat_map(|s| s.outputs.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.stages.iter().flat_map(|s| s.warnings.iter()).collect()
    }

    /// Stage report by name (last one wins if a stage ran twice).
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().rev().find(|s| s.stage == name)
    }

    /// Format a summary of the run.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let outputs = self.output_count();
        let failed = self.failed_count();
        let stages = self.stages.len();

        if failed > 0 {
            lines.push(format!(
                "Finished with errors: {} files written, {} failed ({} stages) in {:?}",
                outputs, failed, stages, self.total_duration
            ));
            for stage in self.stages.iter().filter(|s| !s.failures.is_empty()) {
                for failure in &stage.failures {
                    lines.push(format!("  - {}: {}", stage.stage, failure));
                }
            }
        } else {
            lines.push(format!(
                "Finished: {} files written ({} stages) in {:?}",
                outputs, stages, self.total_duration
            ));
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}
