//! Search error types

use thiserror::Error;

/// Errors from the combination search layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A context parameter violates its precondition.
    #[error("invalid search parameter: {0}")]
    InvalidParameter(String),
}

/// Errors from the dosage fitter.
///
/// `Clone` because fit outcomes, including failures, are memoized per
/// formula set for the lifetime of a search run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FitError {
    /// The minimizer hit its iteration cap before converging; the caller
    /// must treat the combination as not evaluable and skip it.
    #[error("unable to fit dosages for combination")]
    DidNotConverge,

    /// A combination referenced a formula key missing from the database.
    #[error("unknown formula: {0}")]
    UnknownFormula(String),
}
