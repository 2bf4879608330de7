use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RegressionError, Result};

/// Ignore pattern applied unless configured otherwise.
pub const DEFAULT_IGNORE: &str = "/cells/*/outputs/*/traceback";

/// Default configuration file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "nbreg.toml";

/// Configuration for the regression comparator.
///
/// Validated by [`crate::RegressionComparator::new`] before any notebook is
/// touched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegressionConfig {
    /// Execute the notebook; when `false` the notebook is compared to itself
    /// after post-processing.
    pub exec_notebook: bool,
    /// Working directory for execution. A private temporary directory is used
    /// when unset.
    pub exec_cwd: Option<PathBuf>,
    /// Keep executing after an unexpected cell error.
    pub exec_allow_errors: bool,
    /// Per-cell timeout in seconds.
    pub exec_timeout: u64,
    /// Record line coverage while executing.
    pub coverage: bool,
    /// Post-processor names, applied in order.
    pub post_processors: Vec<String>,
    /// Initial resources handed to the executor and post-processors.
    pub process_resources: Map<String, Value>,
    /// Path patterns whose differences are ignored.
    pub diff_ignore: Vec<String>,
    /// `(path, regex, replacement)` triples applied before diffing.
    pub diff_replace: Vec<(String, String, String)>,
    pub diff_use_color: bool,
    pub diff_color_words: bool,
    /// Overwrite the source notebook when it differs.
    pub force_regen: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            exec_notebook: true,
            exec_cwd: None,
            exec_allow_errors: false,
            exec_timeout: 120,
            coverage: false,
            post_processors: vec!["coalesce_streams".into()],
            process_resources: Map::new(),
            diff_ignore: vec![DEFAULT_IGNORE.into()],
            diff_replace: Vec::new(),
            diff_use_color: true,
            diff_color_words: false,
            force_regen: false,
        }
    }
}

impl RegressionConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RegressionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Read `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
