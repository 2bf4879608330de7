//! Error types for the diff crate.

/// Errors that can occur while building diff inputs or computing diffs.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A path pattern is not of the form `/a/b/*`.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A replacement regex failed to compile.
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A replacement template has a bad escape or names a group the regex
    /// does not define.
    #[error("invalid replacement '{replacement}': {reason}")]
    InvalidReplacement { replacement: String, reason: String },

    /// The two values at the diff root are not containers of the same kind.
    #[error("cannot diff values of different kinds at '{path}'")]
    Incomparable { path: String },
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
