use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Solved,
    JobFailed,
    SubmissionEmpty,
    /// The job exists but has not reached a terminal state.
    Unfinished,
    Errored { error: String },
}

impl ImageOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, ImageOutcome::Solved)
    }

    /// Solver-side failure: recorded, not an error of this program.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ImageOutcome::JobFailed | ImageOutcome::SubmissionEmpty | ImageOutcome::Unfinished
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ImageOutcome::Errored { .. })
    }
}

/// What happened to one image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub run_id: Uuid,
    /// Redacted image name or URL.
    pub source: String,
    pub stem: String,
    pub submission_id: Option<u64>,
    pub job_id: Option<u64>,
    pub outcome: ImageOutcome,
    pub artifacts: Vec<PathBuf>,
    /// Artifacts the service did not provide or that could not be written.
    pub missing_artifacts: Vec<String>,
    pub constellation_lines: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ImageReport {
    pub fn new(source: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.into(),
            stem: stem.into(),
            submission_id: None,
            job_id: None,
            outcome: ImageOutcome::Unfinished,
            artifacts: Vec::new(),
            missing_artifacts: Vec::new(),
            constellation_lines: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn errored(mut self, error: impl ToString) -> Self {
        self.outcome = ImageOutcome::Errored {
            error: error.to_string(),
        };
        self.finish();
        self
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed_secs(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds())
    }
}

/// Reports for a batch, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub reports: Vec<ImageReport>,
    /// Images never started because the batch stopped early.
    pub skipped: usize,
    /// Why the batch stopped early, if it did.
    pub aborted: Option<String>,
}

impl BatchSummary {
    pub fn solved(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_solved()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn errored(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_error()).count()
    }

    /// Errors, an early stop, or skipped images.
    pub fn has_errors(&self) -> bool {
        self.errored() > 0 || self.aborted.is_some() || self.skipped > 0
    }
}
