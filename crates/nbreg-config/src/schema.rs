//! Schema checks for an `nbreg` metadata section.
//!
//! Accepted shape:
//! - `diff_ignore`: array of path patterns (`/`, then word characters or any
//!   of `/ + - *`)
//! - `diff_replace`: array of `[path, regex, replacement]` string triples
//! - `skip`: boolean
//! - `skip_reason`: string
//!
//! No other keys are allowed.

use nbreg_diff::{DiffError, ReplaceRule};
use serde_json::Value;

use crate::error::SchemaProblem;

/// Characters allowed in a path pattern besides word characters.
const PATTERN_PUNCTUATION: &[char] = &['/', '+', '-', '*'];

/// Check a path pattern, returning the reason it is rejected.
pub fn validate_path_pattern(pattern: &str) -> Result<(), &'static str> {
    let Some(rest) = pattern.strip_prefix('/') else {
        return Err("path must start with '/'");
    };
    let valid = rest
        .chars()
        .all(|ch| ch.is_alphanumeric() || ch == '_' || PATTERN_PUNCTUATION.contains(&ch));
    if valid {
        Ok(())
    } else {
        Err("path may only contain word characters and '/', '+', '-', '*'")
    }
}

/// Validate one metadata section, collecting every problem found.
pub fn validate_section(section: &Value) -> Vec<SchemaProblem> {
    let mut problems = Vec::new();
    let Some(map) = section.as_object() else {
        problems.push(SchemaProblem::new("", "expected an object"));
        return problems;
    };

    for (key, value) in map {
        match key.as_str() {
            "diff_ignore" => check_ignore(value, &mut problems),
            "diff_replace" => check_replace(value, &mut problems),
            "skip" => {
                if !value.is_boolean() {
                    problems.push(SchemaProblem::new(key, "expected a boolean"));
                }
            }
            "skip_reason" => {
                if !value.is_string() {
                    problems.push(SchemaProblem::new(key, "expected a string"));
                }
            }
            other => problems.push(SchemaProblem::new(
                other,
                format!("unknown key '{other}'"),
            )),
        }
    }

    problems
}

fn check_ignore(value: &Value, problems: &mut Vec<SchemaProblem>) {
    let Some(items) = value.as_array() else {
        problems.push(SchemaProblem::new("diff_ignore", "expected an array"));
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let key_path = format!("diff_ignore/{i}");
        match item.as_str() {
            Some(pattern) => {
                if let Err(reason) = validate_path_pattern(pattern) {
                    problems.push(SchemaProblem::new(key_path, format!("'{pattern}': {reason}")));
                }
            }
            None => problems.push(SchemaProblem::new(key_path, "expected a string")),
        }
    }
}

fn check_replace(value: &Value, problems: &mut Vec<SchemaProblem>) {
    let Some(items) = value.as_array() else {
        problems.push(SchemaProblem::new("diff_replace", "expected an array"));
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let key_path = format!("diff_replace/{i}");
        let triple = item
            .as_array()
            .filter(|parts| parts.len() == 3)
            .and_then(|parts| {
                let strings: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
                (strings.len() == 3).then_some(strings)
            });
        let Some(parts) = triple else {
            problems.push(SchemaProblem::new(
                key_path,
                "expected an array of three strings [path, regex, replacement]",
            ));
            continue;
        };
        if let Err(reason) = validate_path_pattern(parts[0]) {
            problems.push(SchemaProblem::new(
                format!("{key_path}/0"),
                format!("'{}': {reason}", parts[0]),
            ));
            continue;
        }
        if let Err(err) = ReplaceRule::new(parts[0], parts[1], parts[2]) {
            let index = match err {
                DiffError::InvalidReplacement { .. } => 2,
                _ => 1,
            };
            problems.push(SchemaProblem::new(format!("{key_path}/{index}"), err.to_string()));
        }
    }
}
