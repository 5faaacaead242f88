//! Errors raised while loading or assembling feature data.

use std::path::PathBuf;

/// Errors from building a [`Population`](super::Population) or
/// [`Instance`](super::Instance), or from reading them off disk.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("no input files given")]
    NoInput,

    #[error("failed to read `{path}`: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("column `{column}` not found in `{path}`")]
    MissingColumn { column: String, path: PathBuf },

    #[error("invalid value `{value}` in column `{column}` (row {row})")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("expected {expected} features, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("{what} has {found} entries but the population has {expected} rows")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("row {row} out of range for {n_samples} rows")]
    RowOutOfRange { row: usize, n_samples: usize },
}
