//! Multiline text handling for the nbformat on-disk representation.
//!
//! On disk, cell sources, stream text and textual mimebundle entries may be
//! stored either as a single string or as a list of lines. In memory they are
//! always held joined; when written back they are split into lines that keep
//! their line endings.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

#[derive(Deserialize)]
#[serde(untagged)]
enum MultilineRepr {
    One(String),
    Many(Vec<String>),
}

/// Deserialize a string-or-list-of-strings field into a joined string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match MultilineRepr::deserialize(deserializer)? {
        MultilineRepr::One(text) => text,
        MultilineRepr::Many(lines) => lines.concat(),
    })
}

/// Deserialize a mimebundle, joining list-of-line values for textual types.
pub fn deserialize_mimebundle<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Map::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(mime, value)| {
            let value = if is_json_mime(&mime) {
                value
            } else {
                join_value(value)
            };
            (mime, value)
        })
        .collect())
}

/// Whether a mimetype carries JSON data that must not be joined or split.
pub fn is_json_mime(mime: &str) -> bool {
    mime == "application/json" || mime.ends_with("+json")
}

/// Split text into lines, keeping line endings (`"a\nb"` → `["a\n", "b"]`).
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

fn join_value(value: Value) -> Value {
    match value {
        Value::Array(items) if items.iter().all(Value::is_string) => Value::String(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .concat(),
        ),
        other => other,
    }
}

/// Replace a string value by its line-split list form.
pub(crate) fn split_value(value: &mut Value) {
    if let Value::String(text) = value {
        let lines = split_lines(text).into_iter().map(Value::String).collect();
        *value = Value::Array(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize")]
        text: String,
    }

    #[test]
    fn joins_list_of_lines() {
        let holder: Holder = serde_json::from_value(json!({"text": ["a\n", "b"]})).unwrap();
        assert_eq!(holder.text, "a\nb");
    }

    #[test]
    fn accepts_plain_string() {
        let holder: Holder = serde_json::from_value(json!({"text": "a\nb"})).unwrap();
        assert_eq!(holder.text, "a\nb");
    }

    #[test]
    fn split_keeps_line_endings() {
        assert_eq!(split_lines("a\nb\n"), vec!["a\n", "b\n"]);
        assert_eq!(split_lines("a\nb"), vec!["a\n", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn json_mimetypes_are_left_alone() {
        assert!(is_json_mime("application/json"));
        assert!(is_json_mime("application/vnd.vegalite.v4+json"));
        assert!(!is_json_mime("text/plain"));
    }
}
