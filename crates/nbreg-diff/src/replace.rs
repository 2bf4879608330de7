//! Path-scoped regex replacement over string leaves.
//!
//! Used to scrub volatile text (dates, addresses, timings) from both trees
//! before they are diffed.

use std::fmt;

use nbreg_types::{generalize_suffixes, PathSegment};
use regex::Regex;
use serde_json::Value;

use crate::error::{DiffError, DiffResult};
use crate::filter::validate_pattern;

/// A validated `(path, regex, replacement)` triple.
///
/// The replacement is a template in the notation notebook metadata uses:
/// `\1` and `\g<name>` refer to groups, `\n`, `\t`, `\r` and `\\` are
/// escapes, and every other character, `$` included, is literal.
#[derive(Clone)]
pub struct ReplaceRule {
    path: String,
    regex: Regex,
    replacement: String,
    /// `replacement` rewritten into `regex` expansion syntax.
    expansion: String,
}

impl ReplaceRule {
    /// Validate and compile a rule.
    pub fn new(
        path: impl Into<String>,
        regex: &str,
        replacement: impl Into<String>,
    ) -> DiffResult<Self> {
        let path = path.into();
        validate_pattern(&path)?;
        let regex = Regex::new(regex).map_err(|source| DiffError::InvalidRegex {
            pattern: regex.to_string(),
            source,
        })?;
        let replacement = replacement.into();
        let expansion = translate_template(&replacement, &regex)?;
        Ok(Self {
            path,
            regex,
            replacement,
            expansion,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Whether this rule applies to a leaf with the given generalized forms.
    fn applies_to<'a>(&self, forms: impl IntoIterator<Item = &'a String>) -> bool {
        forms.into_iter().any(|form| form.starts_with(&self.path))
    }
}

impl fmt::Debug for ReplaceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaceRule")
            .field("path", &self.path)
            .field("regex", &self.regex.as_str())
            .field("replacement", &self.replacement)
            .finish()
    }
}

impl PartialEq for ReplaceRule {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.regex.as_str() == other.regex.as_str()
            && self.replacement == other.replacement
    }
}

/// Rewrite a replacement template into `regex` expansion syntax, checking
/// that every group it names exists.
fn translate_template(template: &str, regex: &Regex) -> DiffResult<String> {
    let invalid = |reason: String| DiffError::InvalidReplacement {
        replacement: template.to_string(),
        reason,
    };
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '$' {
            out.push_str("$$");
            continue;
        }
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            None => return Err(invalid("trailing backslash".into())),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('0') => out.push('\0'),
            Some('g') => {
                if chars.next() != Some('<') {
                    return Err(invalid("expected '<' after \\g".into()));
                }
                let mut group = String::new();
                loop {
                    match chars.next() {
                        Some('>') => break,
                        Some(c) => group.push(c),
                        None => return Err(invalid("unterminated group name".into())),
                    }
                }
                out.push_str(&group_reference(&group, regex).map_err(invalid)?);
            }
            Some(digit) if digit.is_ascii_digit() => {
                // At most two digits form a group number.
                let mut group = digit.to_string();
                if let Some(next) = chars.next_if(char::is_ascii_digit) {
                    group.push(next);
                }
                out.push_str(&group_reference(&group, regex).map_err(invalid)?);
            }
            Some(other) if other.is_ascii_alphabetic() => {
                return Err(invalid(format!("bad escape \\{other}")));
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn group_reference(group: &str, regex: &Regex) -> Result<String, String> {
    let known = match group.parse::<usize>() {
        Ok(index) => index < regex.captures_len(),
        Err(_) => regex.capture_names().flatten().any(|name| name == group),
    };
    if known {
        Ok(format!("${{{group}}}"))
    } else {
        Err(format!("unknown group '{group}'"))
    }
}

/// Return a copy of `value` with every applicable rule applied to each
/// string leaf, rules taken in order.
pub fn apply_replacements(value: &Value, rules: &[ReplaceRule]) -> Value {
    let mut out = value.clone();
    if !rules.is_empty() {
        let mut path = Vec::new();
        replace_in(&mut out, rules, &mut path);
    }
    out
}

fn replace_in(value: &mut Value, rules: &[ReplaceRule], path: &mut Vec<PathSegment>) {
    match value {
        Value::String(text) => {
            let forms = generalize_suffixes(path);
            for rule in rules.iter().filter(|rule| rule.applies_to(&forms)) {
                let replaced = rule
                    .regex
                    .replace_all(text, rule.expansion.as_str())
                    .into_owned();
                *text = replaced;
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                path.push(PathSegment::Index(index));
                replace_in(item, rules, path);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                path.push(PathSegment::Key(key.clone()));
                replace_in(item, rules, path);
                path.pop();
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notebook_tree() -> Value {
        let mut cells: Vec<Value> = (0..5).map(|_| json!({"source": "", "outputs": []})).collect();
        cells.push(json!({
            "source": "print('2020-01-01')",
            "outputs": [{"output_type": "stream", "name": "stdout", "text": "2020-01-01"}]
        }));
        json!({"cells": cells, "metadata": {}})
    }

    #[test]
    fn replacement_is_scoped_to_path() {
        let rule = ReplaceRule::new("/cells/*/outputs", r"\d{4}-\d{2}-\d{2}", "DATE").unwrap();
        let input = notebook_tree();
        let out = apply_replacements(&input, &[rule]);
        assert_eq!(out["cells"][5]["outputs"][0]["text"], json!("DATE"));
        assert_eq!(out["cells"][5]["source"], json!("print('2020-01-01')"));
        // The input is not modified.
        assert_eq!(input["cells"][5]["outputs"][0]["text"], json!("2020-01-01"));
    }

    #[test]
    fn rules_apply_in_order() {
        let rules = vec![
            ReplaceRule::new("/", "a", "b").unwrap(),
            ReplaceRule::new("/", "b", "c").unwrap(),
        ];
        let out = apply_replacements(&json!({"x": "ab"}), &rules);
        assert_eq!(out, json!({"x": "cc"}));
    }

    #[test]
    fn replaces_all_matches_with_group_references() {
        let rule = ReplaceRule::new("/text", r"at 0x([0-9a-f]+)", "at ADDR").unwrap();
        let out = apply_replacements(&json!({"text": "<obj at 0x1f> <obj at 0xab>"}), &[rule]);
        assert_eq!(out, json!({"text": "<obj at ADDR> <obj at ADDR>"}));

        let rule = ReplaceRule::new("/", r"(\w+)@(\w+)", r"\2@\1").unwrap();
        let out = apply_replacements(&json!(["user@host"]), &[rule]);
        assert_eq!(out, json!(["host@user"]));

        let rule = ReplaceRule::new("/", r"(?P<user>\w+)@(?P<host>\w+)", r"\g<host>:\g<1>").unwrap();
        let out = apply_replacements(&json!(["user@host"]), &[rule]);
        assert_eq!(out, json!(["host:user"]));
    }

    #[test]
    fn dollar_signs_in_replacements_are_literal() {
        let rule = ReplaceRule::new("/", r"0x[0-9a-f]+", "$ADDR").unwrap();
        let out = apply_replacements(&json!({"text": "<obj at 0x1f>"}), &[rule]);
        assert_eq!(out, json!({"text": "<obj at $ADDR>"}));

        let rule = ReplaceRule::new("/", r"(\d+)", r"$$\1 \\ ok\n").unwrap();
        let out = apply_replacements(&json!(["cost 5"]), &[rule]);
        assert_eq!(out, json!(["cost $$5 \\ ok\n"]));
    }

    #[test]
    fn unknown_groups_are_rejected() {
        for replacement in [r"\2", r"\g<missing>", r"\g<1", r"\q", "\\"] {
            let err = ReplaceRule::new("/", r"(\w+)", replacement).unwrap_err();
            assert!(
                matches!(err, DiffError::InvalidReplacement { .. }),
                "{replacement} should be rejected"
            );
        }
    }

    #[test]
    fn non_string_leaves_are_untouched() {
        let rule = ReplaceRule::new("/", r"\d", "N").unwrap();
        let input = json!({"count": 12, "flag": true, "none": null, "label": "v1"});
        let out = apply_replacements(&input, &[rule]);
        assert_eq!(out, json!({"count": 12, "flag": true, "none": null, "label": "vN"}));
    }

    #[test]
    fn relative_paths_are_rejected() {
        let err = ReplaceRule::new("cells", "x", "y").unwrap_err();
        assert!(matches!(err, DiffError::InvalidPattern { .. }));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = ReplaceRule::new("/cells", "(unclosed", "y").unwrap_err();
        assert!(matches!(err, DiffError::InvalidRegex { .. }));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn no_rules_is_identity() {
        let input = notebook_tree();
        assert_eq!(apply_replacements(&input, &[]), input);
    }
}
