use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading, writing or converting notebooks.
#[derive(Debug, Error)]
pub enum NotebookError {
    /// The notebook file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content is not valid JSON or does not match the notebook shape.
    #[error("invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Only nbformat version 4 documents are supported.
    #[error("unsupported nbformat version: {found} (expected 4)")]
    UnsupportedVersion { found: u64 },

    /// The document is structurally malformed.
    #[error("malformed notebook: {0}")]
    Malformed(String),
}

impl NotebookError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for notebook operations.
pub type NotebookResult<T> = Result<T, NotebookError>;
