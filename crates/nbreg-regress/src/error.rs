use std::path::PathBuf;

use nbreg_exec::ExecutionError;

/// Errors raised by the regression comparator.
///
/// The last three variants are comparison outcomes surfaced as errors when
/// the caller asks for failures to be raised; each carries the rendered diff.
#[derive(Debug, thiserror::Error)]
pub enum RegressionError {
    /// Comparator or embedded configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] nbreg_config::ConfigError),

    /// A configuration file is not valid TOML for [`crate::RegressionConfig`].
    #[error("invalid configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("notebook error: {0}")]
    Notebook(#[from] nbreg_types::NotebookError),

    /// The executor itself failed (not the notebook's code).
    #[error("executor error: {0}")]
    Exec(#[from] nbreg_exec::ExecError),

    #[error("diff error: {0}")]
    Diff(#[from] nbreg_diff::DiffError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The obtained notebook differs from the expected one.
    #[error("notebook output differs from the expected output:{diff}")]
    Mismatch { diff: String },

    /// The expected notebook was overwritten with the obtained one.
    #[error("regenerated expected notebook at {}:{diff}", path.display())]
    Regenerated { path: PathBuf, diff: String },

    /// The notebook raised while executing.
    #[error("notebook execution failed: {error}{diff}")]
    Execution { error: ExecutionError, diff: String },
}

/// Convenience alias for comparator results.
pub type Result<T, E = RegressionError> = std::result::Result<T, E>;
