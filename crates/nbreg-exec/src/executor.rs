//! The execution seam between the comparator and a notebook runtime.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use nbreg_types::Notebook;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ExecError, ExecResult};

/// Side-channel data threaded through execution and post-processing.
pub type Resources = Map<String, Value>;

/// Resource key under which recorded coverage data (JSON text) is stored.
pub const COVERAGE_KEY: &str = "coverage_data";

/// Parameters for one execution.
#[derive(Clone, Debug)]
pub struct ExecRequest {
    /// Working directory; see [`execute_in_workdir`] for the `None` case.
    pub cwd: Option<PathBuf>,
    /// Maximum time allowed for each cell.
    pub timeout: Duration,
    /// Keep running after an unexpected cell error.
    pub allow_errors: bool,
    /// Record line coverage of the executed code.
    pub coverage: bool,
    pub resources: Resources,
}

impl Default for ExecRequest {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout: Duration::from_secs(120),
            allow_errors: false,
            coverage: false,
            resources: Resources::new(),
        }
    }
}

/// A failure raised inside the notebook while it ran.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("cell {cell_index} raised {ename}: {evalue}")]
    Cell {
        cell_index: usize,
        ename: String,
        evalue: String,
    },

    #[error("{} timed out after {seconds}s", timeout_subject(.cell_index))]
    Timeout {
        cell_index: Option<usize>,
        seconds: u64,
    },

    #[error("coverage recording failed: {0}")]
    Coverage(String),

    #[error("kernel failure: {0}")]
    Kernel(String),
}

fn timeout_subject(cell_index: &Option<usize>) -> String {
    match cell_index {
        Some(index) => format!("cell {index}"),
        None => "execution".to_string(),
    }
}

/// What an executor hands back.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// The executed notebook, possibly partial when `error` is set.
    pub notebook: Notebook,
    pub error: Option<ExecutionError>,
    pub resources: Resources,
}

impl ExecutionResult {
    /// A clean run.
    pub fn ok(notebook: Notebook, resources: Resources) -> Self {
        Self {
            notebook,
            error: None,
            resources,
        }
    }

    /// A run that stopped with `error`.
    pub fn failed(notebook: Notebook, error: ExecutionError, resources: Resources) -> Self {
        Self {
            notebook,
            error: Some(error),
            resources,
        }
    }

    pub fn has_coverage(&self) -> bool {
        self.resources.contains_key(COVERAGE_KEY)
    }

    /// Recorded coverage as `file -> executed line numbers`, if any.
    pub fn coverage_data(&self) -> ExecResult<Option<BTreeMap<String, Vec<u64>>>> {
        let Some(raw) = self.resources.get(COVERAGE_KEY).and_then(Value::as_str) else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| ExecError::InvalidOutput(format!("coverage data: {e}")))
    }
}

/// Runs a notebook.
///
/// Implementations must not mutate the caller's notebook; they return the
/// executed copy in [`ExecutionResult::notebook`].
pub trait Executor: Send + Sync {
    fn execute(&self, notebook: &Notebook, request: &ExecRequest) -> ExecResult<ExecutionResult>;
}

impl<F> Executor for F
where
    F: Fn(&Notebook, &ExecRequest) -> ExecResult<ExecutionResult> + Send + Sync,
{
    fn execute(&self, notebook: &Notebook, request: &ExecRequest) -> ExecResult<ExecutionResult> {
        self(notebook, request)
    }
}

/// Run `executor` in the requested working directory.
///
/// Without a `cwd`, a private temporary directory is created for the run and
/// removed when this function returns, whatever the outcome. The directory
/// used is recorded in `resources.metadata.path`; a `metadata` entry that is
/// not an object is replaced.
pub fn execute_in_workdir<E>(
    executor: &E,
    notebook: &Notebook,
    mut request: ExecRequest,
) -> ExecResult<ExecutionResult>
where
    E: Executor + ?Sized,
{
    let scratch = match &request.cwd {
        Some(_) => None,
        None => {
            let dir = tempfile::Builder::new()
                .prefix("nbreg-")
                .tempdir()
                .map_err(|e| ExecError::io(std::env::temp_dir(), e))?;
            debug!(path = %dir.path().display(), "created scratch working directory");
            request.cwd = Some(dir.path().to_path_buf());
            Some(dir)
        }
    };

    if let Some(cwd) = &request.cwd {
        let metadata = request
            .resources
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            warn!(found = %metadata, "replacing non-object resources.metadata");
            *metadata = Value::Object(Map::new());
        }
        if let Value::Object(metadata) = metadata {
            metadata.insert("path".into(), Value::String(cwd.display().to_string()));
        }
    }

    let result = executor.execute(notebook, &request);
    drop(scratch);
    result
}
