//! Post-processors applied to executed notebooks before diffing.
//!
//! A post-processor is a plain function over `(notebook, resources)`. The
//! registry maps names to functions so configurations can refer to them by
//! name.

use std::collections::BTreeMap;
use std::fmt;

use nbreg_types::{Notebook, Output};

use crate::executor::Resources;

/// Signature of a post-processor.
pub type ProcessorFn = fn(Notebook, Resources) -> (Notebook, Resources);

/// A named post-processor.
#[derive(Clone)]
pub struct Processor {
    pub name: String,
    pub description: String,
    pub run: ProcessorFn,
}

impl Processor {
    pub fn apply(&self, notebook: Notebook, resources: Resources) -> (Notebook, Resources) {
        (self.run)(notebook, resources)
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Name-indexed table of post-processors.
#[derive(Clone, Debug, Default)]
pub struct ProcessorRegistry {
    processors: BTreeMap<String, Processor>,
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in processors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            "coalesce_streams",
            "Merge all stream outputs with shared names into single streams,\n\
             resolve backspace and carriage-return characters and order stdout\n\
             before stderr, so that stream output is deterministic.",
            coalesce_streams,
        );
        registry
    }

    /// Add or replace a processor.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        run: ProcessorFn,
    ) {
        let name = name.into();
        self.processors.insert(
            name.clone(),
            Processor {
                name,
                description: description.into(),
                run,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Processor> {
        self.processors.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.processors.keys().map(String::as_str).collect()
    }

    /// One indented description block per processor.
    pub fn describe(&self) -> String {
        self.processors
            .values()
            .map(|p| {
                let body: Vec<String> = p.description.lines().map(|l| format!("  {l}")).collect();
                format!("{}:\n{}", p.name, body.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ---------------------------------------------------------------------------
// coalesce_streams
// ---------------------------------------------------------------------------

/// Merge stream outputs per name and normalize their control characters.
///
/// For every code cell:
/// 1. stream outputs sharing a `name` are concatenated into the first one;
/// 2. `<char><backspace>` pairs are cancelled until none remain, and
///    everything up to a carriage return followed by more text on the same
///    line is dropped;
/// 3. a stdout stream directly after a stderr stream is moved in front of it.
pub fn coalesce_streams(mut notebook: Notebook, resources: Resources) -> (Notebook, Resources) {
    for cell in notebook.cells.iter_mut() {
        if let Some(code) = cell.as_code_mut() {
            code.outputs = coalesce_outputs(std::mem::take(&mut code.outputs));
        }
    }
    (notebook, resources)
}

fn coalesce_outputs(outputs: Vec<Output>) -> Vec<Output> {
    let mut merged: Vec<Output> = Vec::with_capacity(outputs.len());
    let mut first_by_name: BTreeMap<String, usize> = BTreeMap::new();

    for output in outputs {
        match output {
            Output::Stream(stream) => match first_by_name.get(&stream.name) {
                Some(&at) => {
                    if let Output::Stream(target) = &mut merged[at] {
                        target.text.push_str(&stream.text);
                    }
                }
                None => {
                    first_by_name.insert(stream.name.clone(), merged.len());
                    merged.push(Output::Stream(stream));
                }
            },
            other => merged.push(other),
        }
    }

    for &at in first_by_name.values() {
        if let Output::Stream(stream) = &mut merged[at] {
            stream.text = strip_carriage_returns(&cancel_backspaces(&stream.text));
        }
    }

    let mut i = 0;
    while i + 1 < merged.len() {
        if stream_named(&merged[i], "stderr") && stream_named(&merged[i + 1], "stdout") {
            merged.swap(i, i + 1);
        }
        i += 1;
    }

    merged
}

fn stream_named(output: &Output, name: &str) -> bool {
    output.as_stream().is_some_and(|s| s.name == name)
}

/// Cancel `<non-newline char><backspace>` pairs until the text stops shrinking.
fn cancel_backspaces(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = cancel_backspaces_once(&current);
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

fn cancel_backspaces_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\n' && chars.peek() == Some(&'\u{8}') {
            chars.next();
            continue;
        }
        out.push(ch);
    }
    out
}

/// On each line, drop everything up to the last carriage return that is
/// followed by another character on that line.
fn strip_carriage_returns(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            let bytes = line.as_bytes();
            let cut = (0..bytes.len())
                .rev()
                .find(|&i| bytes[i] == b'\r' && bytes.get(i + 1).is_some_and(|&next| next != b'\n'));
            match cut {
                Some(i) => &line[i + 1..],
                None => line,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbreg_types::{Cell, CodeCell};

    fn code_cell(outputs: Vec<Output>) -> Notebook {
        Notebook::with_cells(vec![Cell::Code(CodeCell::new("x").with_outputs(outputs))])
    }

    fn outputs(nb: &Notebook) -> &[Output] {
        nb.cells[0].outputs()
    }

    #[test]
    fn merges_streams_with_the_same_name() {
        let nb = code_cell(vec![
            Output::stream("stdout", "hallo1\n"),
            Output::stream("stdout", "hallo2\n"),
        ]);
        let (nb, _) = coalesce_streams(nb, Resources::new());
        assert_eq!(outputs(&nb), &[Output::stream("stdout", "hallo1\nhallo2\n")]);
    }

    #[test]
    fn non_stream_outputs_keep_their_place() {
        let nb = code_cell(vec![
            Output::stream("stdout", "a"),
            Output::error("E", "v", vec![]),
            Output::stream("stdout", "b"),
        ]);
        let (nb, _) = coalesce_streams(nb, Resources::new());
        assert_eq!(
            outputs(&nb),
            &[Output::stream("stdout", "ab"), Output::error("E", "v", vec![])]
        );
    }

    #[test]
    fn stdout_is_moved_before_stderr() {
        let nb = code_cell(vec![
            Output::stream("stderr", "warn\n"),
            Output::stream("stdout", "out\n"),
            Output::stream("stderr", "more\n"),
        ]);
        let (nb, _) = coalesce_streams(nb, Resources::new());
        assert_eq!(
            outputs(&nb),
            &[
                Output::stream("stdout", "out\n"),
                Output::stream("stderr", "warn\nmore\n"),
            ]
        );
    }

    #[test]
    fn backspaces_are_resolved() {
        assert_eq!(cancel_backspaces("abc\u{8}\u{8}d"), "ad");
        assert_eq!(cancel_backspaces("a\n\u{8}b"), "a\n\u{8}b");
    }

    #[test]
    fn carriage_returns_keep_last_segment() {
        assert_eq!(strip_carriage_returns("10%\r50%\r100%\n"), "100%\n");
        assert_eq!(strip_carriage_returns("line\r\nnext"), "line\r\nnext");
        assert_eq!(strip_carriage_returns("a\rb\r\n"), "b\r\n");
    }

    #[test]
    fn progress_bar_output_is_normalized() {
        let nb = code_cell(vec![
            Output::stream("stdout", "0%\r"),
            Output::stream("stdout", "100%\ndone\n"),
        ]);
        let (nb, _) = coalesce_streams(nb, Resources::new());
        assert_eq!(outputs(&nb), &[Output::stream("stdout", "100%\ndone\n")]);
    }

    #[test]
    fn markdown_cells_are_untouched() {
        let nb = Notebook::with_cells(vec![Cell::markdown("# title")]);
        let (out, _) = coalesce_streams(nb.clone(), Resources::new());
        assert_eq!(out, nb);
    }

    #[test]
    fn registry_lists_builtins() {
        let registry = ProcessorRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["coalesce_streams"]);
        assert!(registry.get("coalesce_streams").is_some());
        assert!(registry.get("blacken_code").is_none());
        assert!(registry.describe().starts_with("coalesce_streams:\n  Merge"));
    }

    #[test]
    fn custom_processors_can_be_registered() {
        fn clear_outputs(mut nb: Notebook, resources: Resources) -> (Notebook, Resources) {
            for cell in nb.cells.iter_mut() {
                if let Some(code) = cell.as_code_mut() {
                    code.outputs.clear();
                }
            }
            (nb, resources)
        }
        let mut registry = ProcessorRegistry::with_builtins();
        registry.register("clear_outputs", "Remove all outputs.", clear_outputs);
        let nb = code_cell(vec![Output::stream("stdout", "x")]);
        let (nb, _) = registry.get("clear_outputs").unwrap().apply(nb, Resources::new());
        assert!(outputs(&nb).is_empty());
        assert_eq!(registry.names(), vec!["clear_outputs", "coalesce_streams"]);
    }
}
