//! Regression settings embedded in notebook metadata.
//!
//! A notebook (and each of its cells) may carry an `nbreg` metadata section
//! that extends the ignore patterns and replacement rules used when it is
//! compared, or marks the notebook to be skipped. This crate validates those
//! sections and folds them into one [`MetadataConfig`].

pub mod error;
pub mod metadata;
pub mod schema;

pub use error::{ConfigError, ConfigResult, SchemaProblem};
pub use metadata::{config_from_metadata, MetadataConfig, METADATA_KEY};
pub use schema::{validate_path_pattern, validate_section};
