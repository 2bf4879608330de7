//! Extraction of the merged per-notebook configuration.

use std::collections::BTreeSet;

use nbreg_diff::ReplaceRule;
use nbreg_types::Notebook;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult, SchemaProblem};
use crate::schema::validate_section;

/// Metadata key holding the regression settings.
pub const METADATA_KEY: &str = "nbreg";

/// Regression settings collected from a notebook and its cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataConfig {
    /// Ignore patterns; cell-level entries are prefixed with `/cells/{i}`.
    pub diff_ignore: BTreeSet<String>,
    /// Replacement triples in document order, notebook level first.
    pub diff_replace: Vec<(String, String, String)>,
    /// Skip the notebook entirely (notebook level only).
    pub skip: bool,
    pub skip_reason: String,
}

impl MetadataConfig {
    /// Compile the replacement triples.
    pub fn replace_rules(&self) -> ConfigResult<Vec<ReplaceRule>> {
        self.diff_replace
            .iter()
            .map(|(path, regex, replacement)| {
                ReplaceRule::new(path.as_str(), regex, replacement.as_str()).map_err(ConfigError::from)
            })
            .collect()
    }

    /// Fold one validated section into this config, scoping its paths.
    fn absorb(&mut self, section: Section, prefix: &str) {
        self.diff_ignore
            .extend(section.diff_ignore.into_iter().map(|p| format!("{prefix}{p}")));
        self.diff_replace.extend(
            section
                .diff_replace
                .into_iter()
                .map(|(path, regex, replacement)| (format!("{prefix}{path}"), regex, replacement)),
        );
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Section {
    diff_ignore: Vec<String>,
    diff_replace: Vec<(String, String, String)>,
    skip: bool,
    skip_reason: String,
}

/// Validate and parse the section stored under [`METADATA_KEY`], if any.
fn read_section(metadata: &Map<String, Value>, location: &str) -> ConfigResult<Option<Section>> {
    let Some(raw) = metadata.get(METADATA_KEY) else {
        return Ok(None);
    };
    let problems = validate_section(raw);
    if !problems.is_empty() {
        return Err(ConfigError::Metadata {
            location: location.to_string(),
            problems,
        });
    }
    serde_json::from_value(raw.clone())
        .map(Some)
        .map_err(|err| ConfigError::Metadata {
            location: location.to_string(),
            problems: vec![SchemaProblem::new("", err.to_string())],
        })
}

/// Collect the regression settings embedded in a notebook.
///
/// Notebook-level patterns are taken as written; a cell's patterns are
/// scoped to that cell, so `/outputs` on cell 1 becomes `/cells/1/outputs`.
/// Any schema violation aborts with the location of the offending section.
pub fn config_from_metadata(notebook: &Notebook) -> ConfigResult<MetadataConfig> {
    let mut config = MetadataConfig::default();

    if let Some(section) = read_section(&notebook.metadata, "/metadata")? {
        config.skip = section.skip;
        config.skip_reason = section.skip_reason.clone();
        config.absorb(section, "");
    }

    for (index, cell) in notebook.cells.iter().enumerate() {
        let location = format!("/cells/{index}/metadata");
        if let Some(section) = read_section(cell.metadata(), &location)? {
            config.absorb(section, &format!("/cells/{index}"));
        }
    }

    Ok(config)
}
