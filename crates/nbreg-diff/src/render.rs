//! Human-readable rendering of a notebook diff.
//!
//! Each change is printed under a `## <action> <path>:` heading. Text that
//! changed is shown as a line diff (or word diff), everything else as the
//! removed and added JSON values.

use colored::Colorize;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::entry::{DiffEntry, DiffKey};

/// Banner that starts every rendered diff.
pub const DIFF_HEADER: &str = "\n--- expected\n+++ obtained\n";

/// Presentation switches for [`render_diff`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit ANSI colour codes.
    pub use_color: bool,
    /// Show changed text as an inline word diff instead of a line diff.
    pub color_words: bool,
}

/// Render `diff` against the tree it was computed from.
///
/// `initial` supplies the old values for removals and replacements.
pub fn render_diff(initial: &Value, diff: &[DiffEntry], options: RenderOptions) -> String {
    let mut renderer = Renderer {
        options,
        out: String::from(DIFF_HEADER),
    };
    renderer.entries(Some(initial), diff, "");
    renderer.out
}

struct Renderer {
    options: RenderOptions,
    out: String,
}

impl Renderer {
    fn entries(&mut self, node: Option<&Value>, diff: &[DiffEntry], path: &str) {
        let mut iter = diff.iter().peekable();
        while let Some(entry) = iter.next() {
            match entry {
                DiffEntry::Add { key, value } => {
                    self.heading("added", &format!("{path}/{key}"));
                    self.value('+', value);
                }
                DiffEntry::Remove { key } => {
                    self.heading("deleted", &format!("{path}/{key}"));
                    if let Some(old) = child(node, &DiffKey::Name(key.clone())) {
                        self.value('-', old);
                    }
                }
                DiffEntry::Replace { key, value } => {
                    let old = child(node, &DiffKey::Name(key.clone()));
                    self.replacement(&format!("{path}/{key}"), old, value);
                }
                DiffEntry::RemoveRange { key, length } => {
                    // A single-item removal followed by an insert at the same
                    // index is an in-place replacement.
                    if *length == 1 {
                        if let Some(DiffEntry::AddRange { key: at, valuelist }) = iter.peek() {
                            if at == key && valuelist.len() == 1 {
                                let old = child(node, &DiffKey::Index(*key));
                                self.replacement(&format!("{path}/{key}"), old, &valuelist[0]);
                                iter.next();
                                continue;
                            }
                        }
                    }
                    self.heading("deleted", &range_label(path, *key, *length));
                    let items = node.and_then(Value::as_array);
                    for index in *key..key + length {
                        if let Some(old) = items.and_then(|items| items.get(index)) {
                            self.value('-', old);
                        }
                    }
                }
                DiffEntry::AddRange { key, valuelist } => {
                    self.heading("added", &range_label(path, *key, valuelist.len()));
                    for value in valuelist {
                        self.value('+', value);
                    }
                }
                DiffEntry::Patch { key, diff } => {
                    let sub = format!("{path}/{key}");
                    self.entries(child(node, key), diff, &sub);
                }
            }
        }
    }

    fn replacement(&mut self, path: &str, old: Option<&Value>, new: &Value) {
        match (old, new) {
            (Some(Value::String(old)), Value::String(new)) => {
                self.heading("modified", path);
                self.text_diff(old, new);
            }
            (old, new) => {
                self.heading("replaced", path);
                if let Some(old) = old {
                    self.value('-', old);
                }
                self.value('+', new);
            }
        }
    }

    fn heading(&mut self, action: &str, path: &str) {
        let line = format!("## {action} {path}:");
        if self.options.use_color {
            self.out.push_str(&line.blue().bold().to_string());
        } else {
            self.out.push_str(&line);
        }
        self.out.push('\n');
    }

    fn value(&mut self, sign: char, value: &Value) {
        let text = match value {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        for line in text.lines() {
            self.line(sign, line);
        }
    }

    fn line(&mut self, sign: char, line: &str) {
        let line = format!("{sign}{line}");
        let line = match (self.options.use_color, sign) {
            (true, '+') => line.green().to_string(),
            (true, '-') => line.red().to_string(),
            _ => line,
        };
        self.out.push_str(&line);
        self.out.push('\n');
    }

    fn text_diff(&mut self, old: &str, new: &str) {
        if self.options.color_words {
            self.word_diff(old, new);
            return;
        }
        let diff = TextDiff::from_lines(old, new);
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Equal => ' ',
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
            };
            self.line(sign, change.value().trim_end_matches('\n'));
        }
    }

    fn word_diff(&mut self, old: &str, new: &str) {
        let diff = TextDiff::from_words(old, new);
        let mut inline = String::new();
        for change in diff.iter_all_changes() {
            let word = change.value();
            let piece = match (change.tag(), self.options.use_color) {
                (ChangeTag::Equal, _) => word.to_string(),
                (ChangeTag::Delete, true) => word.red().to_string(),
                (ChangeTag::Insert, true) => word.green().to_string(),
                (ChangeTag::Delete, false) => format!("[-{word}-]"),
                (ChangeTag::Insert, false) => format!("{{+{word}+}}"),
            };
            inline.push_str(&piece);
        }
        for line in inline.lines() {
            self.line(' ', line);
        }
    }
}

fn child<'a>(node: Option<&'a Value>, key: &DiffKey) -> Option<&'a Value> {
    match key {
        DiffKey::Index(index) => node?.get(*index),
        DiffKey::Name(name) => node?.get(name.as_str()),
    }
}

fn range_label(path: &str, start: usize, length: usize) -> String {
    if length > 1 {
        format!("{path}/{start}-{}", start + length - 1)
    } else {
        format!("{path}/{start}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::diff_values;
    use serde_json::json;

    fn plain() -> RenderOptions {
        RenderOptions::default()
    }

    #[test]
    fn empty_diff_is_just_the_header() {
        assert_eq!(render_diff(&json!({}), &[], plain()), DIFF_HEADER);
    }

    #[test]
    fn modified_text_shows_line_diff() {
        let a = json!({"cells": [{"source": "a = 1\nprint(a)\n"}]});
        let b = json!({"cells": [{"source": "a = 2\nprint(a)\n"}]});
        let diff = diff_values(&a, &b, &[]).unwrap();
        let text = render_diff(&a, &diff, plain());
        assert!(text.starts_with(DIFF_HEADER));
        assert!(text.contains("## modified /cells/0/source:\n"));
        assert!(text.contains("-a = 1\n"));
        assert!(text.contains("+a = 2\n"));
        assert!(text.contains(" print(a)\n"));
    }

    #[test]
    fn replaced_output_shows_both_values() {
        let a = json!({"cells": [{"outputs": [{"output_type": "stream", "text": "x"}]}]});
        let b = json!({"cells": [{"outputs": [{"output_type": "error", "ename": "E"}]}]});
        let diff = diff_values(&a, &b, &[]).unwrap();
        let text = render_diff(&a, &diff, plain());
        assert!(text.contains("## replaced /cells/0/outputs/0:\n"));
        assert!(text.contains("-  \"output_type\": \"stream\""));
        assert!(text.contains("+  \"output_type\": \"error\""));
    }

    #[test]
    fn ranges_are_labelled() {
        let a = json!({"cells": [1, 2, 3, 4]});
        let b = json!({"cells": [1]});
        let diff = diff_values(&a, &b, &[]).unwrap();
        let text = render_diff(&a, &diff, plain());
        assert!(text.contains("## deleted /cells/1-3:\n-2\n-3\n-4\n"));

        let diff = diff_values(&b, &a, &[]).unwrap();
        let text = render_diff(&b, &diff, plain());
        assert!(text.contains("## added /cells/1-3:\n+2\n+3\n+4\n"));
    }

    #[test]
    fn added_and_deleted_keys() {
        let a = json!({"metadata": {"old": "x"}});
        let b = json!({"metadata": {"new": "y"}});
        let diff = diff_values(&a, &b, &[]).unwrap();
        let text = render_diff(&a, &diff, plain());
        assert!(text.contains("## added /metadata/new:\n+y\n"));
        assert!(text.contains("## deleted /metadata/old:\n-x\n"));
    }

    #[test]
    fn word_diff_marks_changed_words() {
        let a = json!({"text": "the quick fox"});
        let b = json!({"text": "the slow fox"});
        let diff = diff_values(&a, &b, &[]).unwrap();
        let options = RenderOptions {
            use_color: false,
            color_words: true,
        };
        let text = render_diff(&a, &diff, options);
        assert!(text.contains("[-quick-]"));
        assert!(text.contains("{+slow+}"));
    }

    #[test]
    fn plain_rendering_has_no_escape_codes() {
        let a = json!({"text": "1"});
        let b = json!({"text": "2"});
        let diff = diff_values(&a, &b, &[]).unwrap();
        assert!(!render_diff(&a, &diff, plain()).contains('\u{1b}'));
    }
}
