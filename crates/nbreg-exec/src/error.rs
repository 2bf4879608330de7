use std::path::PathBuf;

use thiserror::Error;

/// Unrecoverable executor failures.
///
/// Errors raised by the notebook's own code are not failures of the call;
/// they are reported as [`crate::ExecutionError`] values.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The execution program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The executor produced output that is not a notebook.
    #[error("unreadable executor output: {0}")]
    InvalidOutput(String),

    #[error("notebook error: {0}")]
    Notebook(#[from] nbreg_types::NotebookError),
}

impl ExecError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for executor results.
pub type ExecResult<T> = Result<T, ExecError>;
