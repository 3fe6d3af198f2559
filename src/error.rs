use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the individual pipeline stages.
///
/// Missing fluxes near a catalog line are not errors; they travel through the
/// tabulator as `None`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("header keyword {key} not found in HDU {hdu}")]
    MissingMetadata { key: String, hdu: String },

    #[error("malformed region file {}: {reason}", path.display())]
    MalformedRegion { path: PathBuf, reason: String },

    #[error("redshift must be finite and non-negative, got {0}")]
    InvalidRedshift(f64),

    #[error("invalid cube: {0}")]
    InvalidCube(String),

    #[error("{} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("duplicate line label in catalog: {0}")]
    DuplicateLine(String),

    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
