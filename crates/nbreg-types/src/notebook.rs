//! Typed nbformat v4 document model.
//!
//! Cells and outputs are tagged unions. Every struct keeps unrecognised keys in
//! an `extra` side-map so documents written by newer tools round-trip without
//! losing data.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NotebookError, NotebookResult};
use crate::multiline;

/// The only supported major format version.
pub const NBFORMAT: u32 = 4;

/// Minor version written for newly created notebooks.
pub const NBFORMAT_MINOR: u32 = 5;

// ---------------------------------------------------------------------------
// Notebook
// ---------------------------------------------------------------------------

/// A notebook document: ordered cells plus free-form metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// Major format version (always 4 once loaded).
    pub nbformat: u32,
    /// Minor format version, preserved as declared.
    pub nbformat_minor: u32,
    /// Notebook-level metadata (kernel spec, language info, tool config).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Cells in execution order.
    #[serde(default)]
    pub cells: Vec<Cell>,
    /// Unrecognised top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

impl Notebook {
    /// Create an empty v4 notebook.
    pub fn new() -> Self {
        Self {
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            metadata: Map::new(),
            cells: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Create a notebook holding the given cells.
    pub fn with_cells(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            ..Self::new()
        }
    }

    /// Build a notebook from its in-memory JSON tree, checking the version.
    pub fn from_value(value: Value) -> NotebookResult<Self> {
        let found = value
            .get("nbformat")
            .and_then(Value::as_u64)
            .ok_or_else(|| NotebookError::Malformed("missing 'nbformat' field".into()))?;
        if found != u64::from(NBFORMAT) {
            return Err(NotebookError::UnsupportedVersion { found });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The canonical JSON tree: joined multiline strings, sorted keys.
    ///
    /// This is the shape the differ, filter and replacer operate on.
    pub fn to_value(&self) -> Value {
        // Every key is a string and every leaf is plain JSON, so this
        // conversion cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the notebook has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over code cells together with their index in the notebook.
    pub fn code_cells(&self) -> impl Iterator<Item = (usize, &CodeCell)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| cell.as_code().map(|code| (index, code)))
    }
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// The kind of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

impl CellType {
    /// The `cell_type` string used on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notebook cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Code(CodeCell),
    Markdown(TextCell),
    Raw(TextCell),
}

impl Cell {
    /// A code cell with the given source and no outputs.
    pub fn code(source: impl Into<String>) -> Self {
        Self::Code(CodeCell::new(source))
    }

    /// A markdown cell with the given source.
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::Markdown(TextCell::new(source))
    }

    /// A raw cell with the given source.
    pub fn raw(source: impl Into<String>) -> Self {
        Self::Raw(TextCell::new(source))
    }

    pub fn cell_type(&self) -> CellType {
        match self {
            Self::Code(_) => CellType::Code,
            Self::Markdown(_) => CellType::Markdown,
            Self::Raw(_) => CellType::Raw,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Code(cell) => &cell.source,
            Self::Markdown(cell) | Self::Raw(cell) => &cell.source,
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        match self {
            Self::Code(cell) => &cell.metadata,
            Self::Markdown(cell) | Self::Raw(cell) => &cell.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Self::Code(cell) => &mut cell.metadata,
            Self::Markdown(cell) | Self::Raw(cell) => &mut cell.metadata,
        }
    }

    /// Outputs of a code cell; empty for markdown and raw cells.
    pub fn outputs(&self) -> &[Output] {
        match self {
            Self::Code(cell) => &cell.outputs,
            Self::Markdown(_) | Self::Raw(_) => &[],
        }
    }

    pub fn as_code(&self) -> Option<&CodeCell> {
        match self {
            Self::Code(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_code_mut(&mut self) -> Option<&mut CodeCell> {
        match self {
            Self::Code(cell) => Some(cell),
            _ => None,
        }
    }

    /// Tags listed under `metadata.tags`.
    pub fn tags(&self) -> Vec<&str> {
        self.metadata()
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether the cell carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }
}

/// A code cell: source plus the outputs of its last execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "multiline::deserialize")]
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub execution_count: Option<i64>,
    #[serde(default)]
    pub outputs: Vec<Output>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CodeCell {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            metadata: Map::new(),
            execution_count: None,
            outputs: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Builder-style setter for outputs.
    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Builder-style setter for the execution counter.
    pub fn with_execution_count(mut self, count: i64) -> Self {
        self.execution_count = Some(count);
        self
    }
}

/// A markdown or raw cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "multiline::deserialize")]
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Inline attachments keyed by file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextCell {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            metadata: Map::new(),
            attachments: None,
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A single output produced by executing a code cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream(StreamOutput),
    ExecuteResult(ExecuteResult),
    DisplayData(DisplayData),
    Error(ErrorOutput),
}

impl Output {
    /// A stream output (`stdout` / `stderr`).
    pub fn stream(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Stream(StreamOutput {
            name: name.into(),
            text: text.into(),
            extra: Map::new(),
        })
    }

    /// An error output.
    pub fn error(
        ename: impl Into<String>,
        evalue: impl Into<String>,
        traceback: Vec<String>,
    ) -> Self {
        Self::Error(ErrorOutput {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback,
            extra: Map::new(),
        })
    }

    /// The `output_type` string used on disk.
    pub fn output_type(&self) -> &'static str {
        match self {
            Self::Stream(_) => "stream",
            Self::ExecuteResult(_) => "execute_result",
            Self::DisplayData(_) => "display_data",
            Self::Error(_) => "error",
        }
    }

    pub fn as_stream(&self) -> Option<&StreamOutput> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }
}

/// Text written to a named stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamOutput {
    pub name: String,
    #[serde(default, deserialize_with = "multiline::deserialize")]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The value of the last expression of a cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    #[serde(default, deserialize_with = "multiline::deserialize_mimebundle")]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub execution_count: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Rich data explicitly displayed by a cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayData {
    #[serde(default, deserialize_with = "multiline::deserialize_mimebundle")]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An exception raised while executing a cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorOutput {
    pub ename: String,
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_value() -> Value {
        json!({
            "nbformat": 4,
            "nbformat_minor": 2,
            "metadata": {"kernelspec": {"name": "python3"}},
            "cells": [
                {
                    "cell_type": "code",
                    "execution_count": 2,
                    "metadata": {"tags": ["raises-exception"]},
                    "outputs": [
                        {"name": "stdout", "output_type": "stream", "text": ["hallo\n"]},
                        {
                            "output_type": "execute_result",
                            "execution_count": 2,
                            "metadata": {},
                            "data": {
                                "text/plain": ["1\n", "2"],
                                "application/json": {"a": [1, 2]}
                            }
                        }
                    ],
                    "source": ["print('hallo')\n", "1"]
                },
                {"cell_type": "markdown", "metadata": {}, "source": "# Title", "custom": true}
            ]
        })
    }

    #[test]
    fn parses_cells_and_outputs() {
        let nb = Notebook::from_value(sample_value()).unwrap();
        assert_eq!(nb.len(), 2);
        assert_eq!(nb.nbformat_minor, 2);
        assert_eq!(nb.cells[0].cell_type(), CellType::Code);
        assert_eq!(nb.cells[0].source(), "print('hallo')\n1");
        assert_eq!(nb.cells[0].outputs().len(), 2);
        assert_eq!(nb.cells[0].outputs()[0].output_type(), "stream");
        assert_eq!(nb.cells[1].cell_type(), CellType::Markdown);
        assert!(nb.cells[1].outputs().is_empty());
    }

    #[test]
    fn textual_mimebundle_entries_are_joined() {
        let nb = Notebook::from_value(sample_value()).unwrap();
        match &nb.cells[0].outputs()[1] {
            Output::ExecuteResult(result) => {
                assert_eq!(result.data["text/plain"], json!("1\n2"));
                assert_eq!(result.data["application/json"], json!({"a": [1, 2]}));
                assert_eq!(result.execution_count, Some(2));
            }
            other => panic!("expected execute_result, got {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let nb = Notebook::from_value(sample_value()).unwrap();
        match &nb.cells[1] {
            Cell::Markdown(cell) => assert_eq!(cell.extra.get("custom"), Some(&json!(true))),
            other => panic!("expected markdown cell, got {other:?}"),
        }
        let value = nb.to_value();
        assert_eq!(value["cells"][1]["custom"], json!(true));
        assert_eq!(value["cells"][1]["cell_type"], json!("markdown"));
    }

    #[test]
    fn canonical_value_has_joined_strings() {
        let nb = Notebook::from_value(sample_value()).unwrap();
        let value = nb.to_value();
        assert_eq!(value["cells"][0]["source"], json!("print('hallo')\n1"));
        assert_eq!(value["cells"][0]["outputs"][0]["text"], json!("hallo\n"));
        assert_eq!(value["cells"][0]["outputs"][0]["output_type"], json!("stream"));
        assert_eq!(value["cells"][0]["execution_count"], json!(2));
    }

    #[test]
    fn rejects_other_versions() {
        let mut value = sample_value();
        value["nbformat"] = json!(3);
        let err = Notebook::from_value(value).unwrap_err();
        assert!(matches!(err, NotebookError::UnsupportedVersion { found: 3 }));
    }

    #[test]
    fn rejects_missing_version() {
        let err = Notebook::from_value(json!({"cells": []})).unwrap_err();
        assert!(matches!(err, NotebookError::Malformed(_)));
    }

    #[test]
    fn tags_are_read_from_metadata() {
        let nb = Notebook::from_value(sample_value()).unwrap();
        assert!(nb.cells[0].has_tag("raises-exception"));
        assert!(!nb.cells[1].has_tag("raises-exception"));
    }

    #[test]
    fn value_round_trip_is_lossless() {
        let nb = Notebook::from_value(sample_value()).unwrap();
        let again = Notebook::from_value(nb.to_value()).unwrap();
        assert_eq!(nb, again);
    }

    #[test]
    fn code_cells_iterator_keeps_indices() {
        let nb = Notebook::with_cells(vec![
            Cell::markdown("intro"),
            Cell::code("1 + 1"),
            Cell::raw("raw"),
            Cell::code("2 + 2"),
        ]);
        let indices: Vec<usize> = nb.code_cells().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
