//! Execution collaborators for nbreg.
//!
//! The comparator never runs kernels itself: it hands a notebook copy to an
//! [`Executor`] and then passes the result through a chain of named
//! post-processors looked up in a [`ProcessorRegistry`].
//!
//! # Key Types
//!
//! - [`Executor`] -- runs a notebook; implemented by closures and [`JupyterExecutor`]
//! - [`ExecRequest`] / [`ExecutionResult`] -- executor input and output
//! - [`ExecutionError`] -- a failure *inside* the notebook (cell error, timeout)
//! - [`ExecError`] -- a failure of the executor itself (spawn, I/O)

pub mod error;
pub mod executor;
pub mod jupyter;
pub mod processors;

pub use error::{ExecError, ExecResult};
pub use executor::{
    execute_in_workdir, ExecRequest, ExecutionError, ExecutionResult, Executor, Resources,
    COVERAGE_KEY,
};
pub use jupyter::JupyterExecutor;
pub use processors::{coalesce_streams, Processor, ProcessorFn, ProcessorRegistry};
