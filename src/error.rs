use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::output::WriteFormat;

#[derive(Error, Debug)]
pub enum CaseError {
    #[error("cannot access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing column {column:?} in {path:?}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("invalid config {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid filter value {error_message:?}")]
    FilterValue { error_message: String },
    #[error("output format {format:?} needs an output file")]
    OutputRequired { format: WriteFormat },
    #[error("{what} cannot be written as {format:?}")]
    UnsupportedFormat {
        format: WriteFormat,
        what: &'static str,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl CaseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaseError::Io { path: path.into(), source }
    }
}
