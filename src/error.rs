use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading catalog and photometry files.
///
/// Any of these aborts the run: a malformed input file means the figures
/// would silently be built from the wrong columns.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{path}:{line}: {reason}")]
    DataFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}:{line}: expected at least {expected} columns, found {found}")]
    TooFewColumns {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{path}: no stars left after removing those with bad photometry")]
    NoStarsLeft { path: PathBuf },

    #[error("{path}: the range of the '{column}' column is zero")]
    ZeroRange { path: PathBuf, column: String },

    #[error("unsupported input: {0}")]
    Unsupported(String),
}

/// Errors from the numeric routines (KDE, binning, integration).
#[derive(Debug, Error, PartialEq)]
pub enum NumericError {
    #[error("empty sample")]
    EmptySample,

    #[error("length mismatch: expected {expected} values, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("weights sum to zero")]
    DegenerateWeights,

    #[error("need at least {needed} points, found {found}")]
    TooFewPoints { needed: usize, found: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Fail with [`NumericError::LengthMismatch`] unless every slice has `n` items.
pub fn check_lengths(n: usize, slices: &[&[f64]]) -> Result<(), NumericError> {
    for s in slices {
        if s.len() != n {
            return Err(NumericError::LengthMismatch {
                expected: n,
                found: s.len(),
            });
        }
    }
    Ok(())
}
