//! Reading and writing notebook files.
//!
//! The on-disk form is the canonical tree with multiline fields split into
//! lists of lines, pretty-printed with a one-space indent and sorted keys.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::error::{NotebookError, NotebookResult};
use crate::multiline::{is_json_mime, split_value};
use crate::notebook::Notebook;

/// Parse a notebook from JSON text.
pub fn parse_notebook(text: &str) -> NotebookResult<Notebook> {
    let value: Value = serde_json::from_str(text)?;
    Notebook::from_value(value)
}

/// Read and parse a notebook file.
pub fn read_notebook(path: impl AsRef<Path>) -> NotebookResult<Notebook> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| NotebookError::io(path, e))?;
    parse_notebook(&text)
}

/// Serialize a notebook to its on-disk JSON text.
pub fn notebook_to_string(notebook: &Notebook) -> NotebookResult<String> {
    let mut value = notebook.to_value();
    split_multiline_fields(&mut value);

    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| NotebookError::Malformed(e.to_string()))
}

/// Write a notebook to a file, replacing any existing content.
pub fn write_notebook(notebook: &Notebook, path: impl AsRef<Path>) -> NotebookResult<()> {
    let path = path.as_ref();
    let text = notebook_to_string(notebook)?;
    fs::write(path, text).map_err(|e| NotebookError::io(path, e))
}

fn split_multiline_fields(value: &mut Value) {
    let Some(cells) = value.get_mut("cells").and_then(Value::as_array_mut) else {
        return;
    };
    for cell in cells {
        if let Some(source) = cell.get_mut("source") {
            split_value(source);
        }
        let Some(outputs) = cell.get_mut("outputs").and_then(Value::as_array_mut) else {
            continue;
        };
        for output in outputs {
            if let Some(text) = output.get_mut("text") {
                split_value(text);
            }
            if let Some(data) = output.get_mut("data").and_then(Value::as_object_mut) {
                for (mime, entry) in data.iter_mut() {
                    if !is_json_mime(mime) {
                        split_value(entry);
                    }
                }
            }
        }
    }
}
