use std::fmt;
use std::path::PathBuf;

use nbreg_diff::DiffEntry;
use nbreg_exec::{ExecutionError, Resources};
use nbreg_types::Notebook;

use crate::error::{RegressionError, Result};
use crate::stage::StageRecord;

/// Final decision of a comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No unignored differences and a clean execution.
    Pass,
    /// The notebook asked to be skipped.
    Skipped { reason: String },
    /// Unignored differences were found.
    Mismatch,
    /// Differences were found and the source notebook was overwritten.
    Regenerated { path: PathBuf },
    /// The notebook raised while executing.
    ExecutionFailed(ExecutionError),
}

impl Outcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Skipped { .. } => "skipped",
            Self::Mismatch => "mismatch",
            Self::Regenerated { .. } => "regenerated",
            Self::ExecutionFailed(_) => "execution-failed",
        }
    }

    /// Whether this outcome should fail a test run.
    ///
    /// Regeneration counts as a failure so that a run which rewrote its
    /// baselines never passes silently.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Pass | Self::Skipped { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { reason } if !reason.is_empty() => write!(f, "skipped ({reason})"),
            Self::Regenerated { path } => write!(f, "regenerated {}", path.display()),
            Self::ExecutionFailed(error) => write!(f, "execution failed: {error}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Everything produced by one comparison.
#[derive(Clone, Debug)]
pub struct RegressionResult {
    pub outcome: Outcome,
    /// The notebook as loaded (the expected state).
    pub initial: Notebook,
    /// The notebook after execution and post-processing (the obtained state).
    pub final_notebook: Notebook,
    pub diff_full: Vec<DiffEntry>,
    /// `diff_full` minus ignored paths.
    pub diff_filtered: Vec<DiffEntry>,
    /// Rendered `diff_filtered`.
    pub diff_text: String,
    pub resources: Resources,
    pub stages: Vec<StageRecord>,
}

impl RegressionResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    /// Turn a failing outcome into the matching error.
    pub fn into_checked(self) -> Result<Self> {
        match &self.outcome {
            Outcome::Pass | Outcome::Skipped { .. } => Ok(self),
            Outcome::Mismatch => Err(RegressionError::Mismatch {
                diff: self.diff_text,
            }),
            Outcome::Regenerated { path } => Err(RegressionError::Regenerated {
                path: path.clone(),
                diff: self.diff_text,
            }),
            Outcome::ExecutionFailed(error) => Err(RegressionError::Execution {
                error: error.clone(),
                diff: self.diff_text,
            }),
        }
    }
}
