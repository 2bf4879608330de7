use std::fmt;

use thiserror::Error;

/// One schema violation inside a metadata section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaProblem {
    /// Slash-separated location inside the section (`diff_ignore/0`).
    pub key_path: String,
    pub message: String,
}

impl SchemaProblem {
    pub fn new(key_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- {} [key path: '{}']", self.message, self.key_path)
    }
}

/// Errors raised while validating regression configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An embedded metadata section does not match the schema.
    #[error("{}", format_metadata(.location, .problems))]
    Metadata {
        /// `/metadata` or `/cells/{i}/metadata`.
        location: String,
        problems: Vec<SchemaProblem>,
    },

    /// An ignore pattern or replacement rule is malformed.
    #[error("invalid rule: {0}")]
    Rule(#[from] nbreg_diff::DiffError),

    /// A post-processor name is not registered.
    #[error("unknown post-processor '{name}' (registered: {registered})")]
    UnknownProcessor { name: String, registered: String },

    /// A comparator option has an unacceptable value.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },
}

fn format_metadata(location: &str, problems: &[SchemaProblem]) -> String {
    let mut out = format!("invalid nbreg metadata at {location}:");
    for problem in problems {
        out.push('\n');
        out.push_str(&problem.to_string());
    }
    out
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_error_lists_every_problem() {
        let err = ConfigError::Metadata {
            location: "/cells/2/metadata".into(),
            problems: vec![
                SchemaProblem::new("skip", "expected a boolean"),
                SchemaProblem::new("diff_ignore/0", "expected a string"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid nbreg metadata at /cells/2/metadata:\n\
             - expected a boolean [key path: 'skip']\n\
             - expected a string [key path: 'diff_ignore/0']"
        );
    }
}
