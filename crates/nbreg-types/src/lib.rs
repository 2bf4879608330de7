//! Foundation types for nbreg.
//!
//! This crate provides the notebook document model and the structural path
//! language shared by every other nbreg crate.
//!
//! # Key Types
//!
//! - [`Notebook`] -- a typed nbformat v4 document (cells, outputs, metadata)
//! - [`Cell`] / [`Output`] -- tagged unions over cell and output variants
//! - [`PathSegment`] -- one step of a structural address, used by diff
//!   filtering and regex replacement
//! - [`NotebookError`] -- reading, writing and version errors

pub mod error;
pub mod io;
pub mod multiline;
pub mod notebook;
pub mod path;

pub use error::{NotebookError, NotebookResult};
pub use io::{notebook_to_string, parse_notebook, read_notebook, write_notebook};
pub use notebook::{
    Cell, CellType, CodeCell, DisplayData, ErrorOutput, ExecuteResult, Notebook, Output,
    StreamOutput, TextCell, NBFORMAT, NBFORMAT_MINOR,
};
pub use path::{generalize_suffixes, join, matches_any, split, star, PathSegment, WILDCARD};
