use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a balance run.
///
/// Row-level problems (unparsable coordinates, points without a valid cell)
/// never surface here; they are counted in [`crate::records::DropCounts`].
#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("invalid configuration for `{field}`: {reason}")]
    Configuration { field: &'static str, reason: String },

    #[error("no data selected: category filter leaves no {dataset} records")]
    EmptySelection { dataset: String },

    #[error("{dataset} table has no column named '{column}'")]
    MissingColumn { dataset: String, column: String },

    #[error("run cancelled after stage '{stage}'")]
    Cancelled { stage: String },

    #[error("I/O error accessing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BalanceError {
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        BalanceError::Configuration {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BalanceError>;
