//! Structural differ for notebook trees.
//!
//! The cell list and each cell's output list are compared positionally:
//! execution mutates cells in place, it never inserts or reorders them, so an
//! alignment algorithm would only produce noisier diffs. Every other position
//! uses a generic key-wise / index-wise comparison.

use nbreg_types::{join, star, Notebook, PathSegment};
use serde_json::{Map, Value};

use crate::entry::{DiffEntry, DiffKey};
use crate::error::{DiffError, DiffResult};

/// Whether the sequence at `path` is the cell list or an output list.
///
/// Single outputs and attachment maps are mappings, so they always take
/// the key-wise path and need no entry here.
fn is_positional(path: &[PathSegment]) -> bool {
    matches!(join(&star(path)).as_str(), "/cells" | "/cells/*/outputs")
}

/// Diff two notebooks via their canonical trees.
pub fn diff_notebooks(initial: &Notebook, final_nb: &Notebook) -> DiffResult<Vec<DiffEntry>> {
    diff_values(&initial.to_value(), &final_nb.to_value(), &[])
}

/// Diff two JSON trees rooted at `path`.
///
/// Both values must be mappings or both sequences; anything else has no key
/// to hang a change on and is rejected.
pub fn diff_values(
    initial: &Value,
    final_value: &Value,
    path: &[PathSegment],
) -> DiffResult<Vec<DiffEntry>> {
    diff_containers(initial, final_value, path).ok_or_else(|| DiffError::Incomparable {
        path: join(path),
    })
}

/// Diff two containers of the same kind; `None` when they are not.
fn diff_containers(initial: &Value, final_value: &Value, path: &[PathSegment]) -> Option<Vec<DiffEntry>> {
    match (initial, final_value) {
        (Value::Object(a), Value::Object(b)) => Some(diff_mappings(a, b, path)),
        (Value::Array(a), Value::Array(b)) if is_positional(path) => {
            Some(diff_positional(a, b, path))
        }
        (Value::Array(a), Value::Array(b)) => Some(diff_sequences(a, b, path)),
        _ => None,
    }
}

fn child_path(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut child = path.to_vec();
    child.push(segment);
    child
}

fn diff_mappings(a: &Map<String, Value>, b: &Map<String, Value>, path: &[PathSegment]) -> Vec<DiffEntry> {
    let mut entries = Vec::new();

    // Both maps iterate in sorted key order; merge them.
    let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        match (a.get(key), b.get(key)) {
            (Some(_), None) => entries.push(DiffEntry::Remove { key: key.clone() }),
            (None, Some(value)) => entries.push(DiffEntry::Add {
                key: key.clone(),
                value: value.clone(),
            }),
            (Some(old), Some(new)) => {
                if old == new {
                    continue;
                }
                let sub = child_path(path, PathSegment::Key(key.clone()));
                match diff_containers(old, new, &sub) {
                    Some(diff) if !diff.is_empty() => entries.push(DiffEntry::Patch {
                        key: DiffKey::Name(key.clone()),
                        diff,
                    }),
                    Some(_) => {}
                    None => entries.push(DiffEntry::Replace {
                        key: key.clone(),
                        value: new.clone(),
                    }),
                }
            }
            (None, None) => {}
        }
    }

    entries
}

/// Compare one pair of sequence items at index `i`.
fn diff_item(a: &Value, b: &Value, i: usize, path: &[PathSegment], entries: &mut Vec<DiffEntry>) {
    if a == b {
        return;
    }
    let sub = child_path(path, PathSegment::Index(i));
    match diff_containers(a, b, &sub) {
        Some(diff) if !diff.is_empty() => entries.push(DiffEntry::Patch {
            key: DiffKey::Index(i),
            diff,
        }),
        Some(_) => {}
        None => replace_item(i, b, entries),
    }
}

fn replace_item(i: usize, b: &Value, entries: &mut Vec<DiffEntry>) {
    entries.push(DiffEntry::RemoveRange { key: i, length: 1 });
    entries.push(DiffEntry::AddRange {
        key: i,
        valuelist: vec![b.clone()],
    });
}

fn push_tail(a: &[Value], b: &[Value], entries: &mut Vec<DiffEntry>) {
    if a.len() > b.len() {
        entries.push(DiffEntry::RemoveRange {
            key: b.len(),
            length: a.len() - b.len(),
        });
    }
    if a.len() < b.len() {
        entries.push(DiffEntry::AddRange {
            key: a.len(),
            valuelist: b[a.len()..].to_vec(),
        });
    }
}

fn diff_sequences(a: &[Value], b: &[Value], path: &[PathSegment]) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        diff_item(x, y, i, path, &mut entries);
    }
    push_tail(a, b, &mut entries);
    entries
}

fn diff_positional(a: &[Value], b: &[Value], path: &[PathSegment]) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        if let (Value::Object(xm), Value::Object(ym)) = (x, y) {
            // Outputs of different kinds share no meaningful fields.
            if xm.get("output_type") != ym.get("output_type") {
                replace_item(i, y, &mut entries);
                continue;
            }
        }
        diff_item(x, y, i, path, &mut entries);
    }
    push_tail(a, b, &mut entries);
    entries
}
