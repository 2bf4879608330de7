//! Notebook regression checks.
//!
//! A [`RegressionComparator`] executes a notebook, post-processes the result,
//! diffs it against the stored outputs and decides whether the notebook
//! passed. Ignore patterns and replacement rules come from the
//! [`RegressionConfig`] and from the notebook's own `nbreg` metadata.
//!
//! # Quick Start
//!
//! ```rust
//! use nbreg_exec::{ExecRequest, ExecResult, ExecutionResult, ProcessorRegistry};
//! use nbreg_regress::{Outcome, RegressionComparator, RegressionConfig};
//! use nbreg_types::{Cell, Notebook};
//!
//! fn unchanged(nb: &Notebook, request: &ExecRequest) -> ExecResult<ExecutionResult> {
//!     Ok(ExecutionResult::ok(nb.clone(), request.resources.clone()))
//! }
//!
//! let comparator = RegressionComparator::new(
//!     RegressionConfig::default(),
//!     unchanged,
//!     &ProcessorRegistry::with_builtins(),
//! )
//! .unwrap();
//! let notebook = Notebook::with_cells(vec![Cell::code("1 + 1")]);
//! let result = comparator.check_notebook(&notebook, None).unwrap();
//! assert_eq!(result.outcome, Outcome::Pass);
//! ```

pub mod comparator;
pub mod config;
pub mod error;
pub mod result;
pub mod stage;

pub use comparator::RegressionComparator;
pub use config::{RegressionConfig, CONFIG_FILE_NAME, DEFAULT_IGNORE};
pub use error::{RegressionError, Result};
pub use result::{Outcome, RegressionResult};
pub use stage::{Stage, StageRecord};
