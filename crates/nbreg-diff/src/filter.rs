//! Pruning a diff by ignore patterns.

use nbreg_types::{matches_any, PathSegment};

use crate::entry::DiffEntry;
use crate::error::{DiffError, DiffResult};

/// Check that an ignore pattern is an absolute path.
pub fn validate_pattern(pattern: &str) -> DiffResult<()> {
    if pattern.starts_with('/') {
        Ok(())
    } else {
        Err(DiffError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "must start with '/'".into(),
        })
    }
}

/// Remove every entry whose address matches one of `patterns`.
///
/// An entry's address is its parent's address plus its own key. Patches are
/// filtered recursively and dropped once all of their children are gone.
/// The input diff is left untouched.
pub fn filter_diff<S: AsRef<str>>(diff: &[DiffEntry], patterns: &[S]) -> Vec<DiffEntry> {
    if patterns.is_empty() {
        return diff.to_vec();
    }
    filter_entries(diff, patterns, &[])
}

fn filter_entries<S: AsRef<str>>(
    diff: &[DiffEntry],
    patterns: &[S],
    parent: &[PathSegment],
) -> Vec<DiffEntry> {
    diff.iter()
        .filter_map(|entry| filter_entry(entry, patterns, parent))
        .collect()
}

fn filter_entry<S: AsRef<str>>(
    entry: &DiffEntry,
    patterns: &[S],
    parent: &[PathSegment],
) -> Option<DiffEntry> {
    let mut path = parent.to_vec();
    path.push(entry.key().to_segment());

    if matches_any(&path, patterns) {
        return None;
    }

    match entry {
        DiffEntry::Patch { key, diff } => {
            let kept = filter_entries(diff, patterns, &path);
            (!kept.is_empty()).then(|| DiffEntry::Patch {
                key: key.clone(),
                diff: kept,
            })
        }
        other => Some(other.clone()),
    }
}
