//! Diff entries, serialized in the nbdime diff format.
//!
//! Mapping keys use `add` / `remove` / `replace`, sequence indices use
//! `addrange` / `removerange`, and `patch` nests a child diff under either.

use std::fmt;

use nbreg_types::PathSegment;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The key a diff entry applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiffKey {
    Index(usize),
    Name(String),
}

impl DiffKey {
    /// The path segment this key contributes to an entry's address.
    pub fn to_segment(&self) -> PathSegment {
        match self {
            Self::Index(index) => PathSegment::Index(*index),
            Self::Name(name) => PathSegment::Key(name.clone()),
        }
    }
}

impl fmt::Display for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for DiffKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for DiffKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for DiffKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// A single change in a structural diff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DiffEntry {
    /// A mapping key present only in the final tree.
    Add { key: String, value: Value },
    /// A mapping key present only in the initial tree.
    Remove { key: String },
    /// A mapping key whose leaf value changed.
    Replace { key: String, value: Value },
    /// Items inserted before sequence index `key`.
    AddRange { key: usize, valuelist: Vec<Value> },
    /// `length` items removed starting at sequence index `key`.
    RemoveRange { key: usize, length: usize },
    /// Nested changes under a key or index.
    Patch { key: DiffKey, diff: Vec<DiffEntry> },
}

impl DiffEntry {
    pub fn key(&self) -> DiffKey {
        match self {
            Self::Add { key, .. } | Self::Remove { key } | Self::Replace { key, .. } => {
                DiffKey::Name(key.clone())
            }
            Self::AddRange { key, .. } | Self::RemoveRange { key, .. } => DiffKey::Index(*key),
            Self::Patch { key, .. } => key.clone(),
        }
    }

    /// The `op` tag as written in JSON.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::AddRange { .. } => "addrange",
            Self::RemoveRange { .. } => "removerange",
            Self::Patch { .. } => "patch",
        }
    }

    /// Child entries of a patch; empty for every other op.
    pub fn children(&self) -> &[DiffEntry] {
        match self {
            Self::Patch { diff, .. } => diff,
            _ => &[],
        }
    }

    /// Number of non-patch entries in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Patch { diff, .. } => diff.iter().map(DiffEntry::leaf_count).sum(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_like_nbdime() {
        let entry = DiffEntry::Patch {
            key: DiffKey::Name("cells".into()),
            diff: vec![
                DiffEntry::RemoveRange { key: 2, length: 1 },
                DiffEntry::AddRange {
                    key: 2,
                    valuelist: vec![json!("x")],
                },
            ],
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "op": "patch",
                "key": "cells",
                "diff": [
                    {"op": "removerange", "key": 2, "length": 1},
                    {"op": "addrange", "key": 2, "valuelist": ["x"]}
                ]
            })
        );
    }

    #[test]
    fn patch_keys_accept_indices_and_names() {
        let by_index: DiffEntry =
            serde_json::from_value(json!({"op": "patch", "key": 0, "diff": []})).unwrap();
        assert_eq!(by_index.key(), DiffKey::Index(0));

        let by_name: DiffEntry = serde_json::from_value(
            json!({"op": "patch", "key": "outputs", "diff": [{"op": "remove", "key": "x"}]}),
        )
        .unwrap();
        assert_eq!(by_name.key(), DiffKey::Name("outputs".into()));
        assert_eq!(by_name.children().len(), 1);
        assert_eq!(by_name.leaf_count(), 1);
    }

    #[test]
    fn op_names_match_tags() {
        let entries = [
            DiffEntry::Add {
                key: "a".into(),
                value: json!(1),
            },
            DiffEntry::Remove { key: "a".into() },
            DiffEntry::RemoveRange { key: 0, length: 3 },
        ];
        for entry in entries {
            let value = serde_json::to_value(&entry).unwrap();
            assert_eq!(value["op"], json!(entry.op()));
        }
    }
}
