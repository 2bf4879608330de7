//! Execution through `jupyter nbconvert`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use nbreg_types::{notebook_to_string, parse_notebook, Cell, Notebook, Output};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExecError, ExecResult};
use crate::executor::{ExecRequest, ExecutionError, ExecutionResult, Executor, COVERAGE_KEY};

/// Cells with this tag are expected to raise.
pub const RAISES_EXCEPTION_TAG: &str = "raises-exception";

const COVERAGE_SETUP: &str = "\
import coverage as __coverage
__cov = __coverage.Coverage(data_file=None, data_suffix=True)
__cov.start()
__cov._warn_no_data = False
__cov._warn_unimported_source = False
";

const COVERAGE_TEARDOWN: &str = "\
import json
__cov.stop()
__data = __cov.get_data()
print(json.dumps({name: __data.lines(name) for name in __data.measured_files()}))
";

/// Executes notebooks with a local Jupyter installation.
///
/// The notebook is written to a hidden temporary file inside the working
/// directory and run with `nbconvert --execute --allow-errors`; the first
/// unexpected error output is then reported as the execution error.
#[derive(Clone, Debug)]
pub struct JupyterExecutor {
    /// The `jupyter` program to invoke.
    pub program: PathBuf,
    /// Overrides the kernel named in the notebook.
    pub kernel_name: Option<String>,
}

impl Default for JupyterExecutor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("jupyter"),
            kernel_name: None,
        }
    }
}

impl JupyterExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&self, input: &Path, cwd: &Path, request: &ExecRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("nbconvert")
            .args(["--to", "notebook", "--execute", "--allow-errors", "--stdout"])
            .arg(format!(
                "--ExecutePreprocessor.timeout={}",
                request.timeout.as_secs().max(1)
            ));
        if let Some(kernel) = &self.kernel_name {
            cmd.arg(format!("--ExecutePreprocessor.kernel_name={kernel}"));
        }
        cmd.arg(input)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Executor for JupyterExecutor {
    fn execute(&self, notebook: &Notebook, request: &ExecRequest) -> ExecResult<ExecutionResult> {
        let cwd = request.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        let with_coverage = request.coverage && is_python(notebook);

        let mut to_run = notebook.clone();
        if with_coverage {
            to_run.cells.insert(0, Cell::code(COVERAGE_SETUP));
            to_run.cells.push(Cell::code(COVERAGE_TEARDOWN));
        }

        let mut input = tempfile::Builder::new()
            .prefix(".nbreg-")
            .suffix(".ipynb")
            .tempfile_in(&cwd)
            .map_err(|e| ExecError::io(&cwd, e))?;
        let text = notebook_to_string(&to_run)?;
        let written = input.write_all(text.as_bytes()).and_then(|()| input.flush());
        written.map_err(|e| ExecError::io(input.path(), e))?;

        let mut cmd = self.command(input.path(), &cwd, request);
        debug!(command = ?cmd, "running notebook");
        let output = cmd.output().map_err(|source| ExecError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let mut resources = request.resources.clone();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "notebook execution process failed");
            let error = if stderr.contains("CellTimeoutError") || stderr.contains("timed out") {
                ExecutionError::Timeout {
                    cell_index: None,
                    seconds: request.timeout.as_secs(),
                }
            } else {
                ExecutionError::Kernel(last_lines(&stderr, 20))
            };
            return Ok(ExecutionResult::failed(notebook.clone(), error, resources));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| ExecError::InvalidOutput(e.to_string()))?;
        let mut executed =
            parse_notebook(&stdout).map_err(|e| ExecError::InvalidOutput(e.to_string()))?;

        if with_coverage {
            match take_coverage(&mut executed) {
                Ok(data) => {
                    resources.insert(COVERAGE_KEY.into(), Value::String(data));
                }
                Err(message) => {
                    let error = ExecutionError::Coverage(message);
                    return Ok(ExecutionResult::failed(executed, error, resources));
                }
            }
        }

        if !request.allow_errors {
            if let Some((index, error)) = first_unexpected_error(&executed) {
                // Execution stops at the failing cell; later cells keep their
                // previous state.
                for (later, original) in executed.cells.iter_mut().zip(&notebook.cells).skip(index + 1) {
                    *later = original.clone();
                }
                return Ok(ExecutionResult::failed(executed, error, resources));
            }
        }

        Ok(ExecutionResult::ok(executed, resources))
    }
}

fn is_python(notebook: &Notebook) -> bool {
    notebook
        .metadata
        .get("kernelspec")
        .and_then(|spec| spec.get("name"))
        .and_then(Value::as_str)
        .map_or(true, |name| name.starts_with("python"))
}

/// Remove the injected coverage cells and return the recorded data.
fn take_coverage(executed: &mut Notebook) -> Result<String, String> {
    if executed.cells.len() < 2 {
        return Err("coverage cells missing from executed notebook".into());
    }
    let setup = executed.cells.remove(0);
    let Some(teardown) = executed.cells.pop() else {
        return Err("coverage teardown cell missing from executed notebook".into());
    };

    for (phase, cell) in [("start-up", &setup), ("teardown", &teardown)] {
        if let Some(Output::Error(err)) = cell.outputs().iter().find(|o| matches!(o, Output::Error(_))) {
            return Err(format!(
                "an error occurred while executing coverage {phase}:\n{}\n{}: {}",
                err.traceback.join("\n"),
                err.ename,
                err.evalue
            ));
        }
    }

    match teardown.outputs() {
        [Output::Stream(stream)] if stream.name == "stdout" => Ok(stream.text.clone()),
        other => Err(format!(
            "the teardown coverage cell did not produce the expected output ({} outputs)",
            other.len()
        )),
    }
}

/// The first error output of a cell not tagged as expected to raise.
fn first_unexpected_error(notebook: &Notebook) -> Option<(usize, ExecutionError)> {
    notebook
        .cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| !cell.has_tag(RAISES_EXCEPTION_TAG))
        .filter_map(|(index, cell)| cell.as_code().map(|code| (index, code)))
        .find_map(|(index, code)| {
            code.outputs.iter().find_map(|output| match output {
                Output::Error(err) => Some((
                    index,
                    ExecutionError::Cell {
                        cell_index: index,
                        ename: err.ename.clone(),
                        evalue: err.evalue.clone(),
                    },
                )),
                _ => None,
            })
        })
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
