//! Diff engine for nbreg.
//!
//! Computes structural edit scripts between two notebook trees, prunes them
//! by ignore patterns, rewrites volatile text before comparison and renders
//! the result for humans.
//!
//! # Key Types
//!
//! - [`DiffEntry`] / [`DiffKey`] -- one change at one key or index (nbdime JSON form)
//! - [`ReplaceRule`] -- a validated (path, regex, replacement) triple
//! - [`RenderOptions`] -- colour and word-diff switches for [`render_diff`]

pub mod differ;
pub mod entry;
pub mod error;
pub mod filter;
pub mod render;
pub mod replace;

pub use differ::{diff_notebooks, diff_values};
pub use entry::{DiffEntry, DiffKey};
pub use error::{DiffError, DiffResult};
pub use filter::{filter_diff, validate_pattern};
pub use render::{render_diff, RenderOptions, DIFF_HEADER};
pub use replace::{apply_replacements, ReplaceRule};
