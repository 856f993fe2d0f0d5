//! Converter error types

use thiserror::Error;

/// Errors from the license-registry converter.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// File I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed CSV input.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed YAML configuration or output failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Why a single registry row could not be converted.
///
/// Row failures are logged and the row skipped; they never abort the run.
#[derive(Debug, Error)]
pub enum RowError {
    /// A column the converter relies on is missing from the CSV.
    #[error("missing column {0:?}")]
    MissingColumn(&'static str),

    /// The license number field contains no digits.
    #[error("no license number in {0:?}")]
    NoLicenseNumber(String),

    /// The ingredient header does not state the unit weight.
    #[error("cannot parse unit weight from line 1: {0:?}")]
    BadUnitHeader(String),

    /// An ingredient line does not match any known format.
    #[error("cannot parse ingredient from line {line}: {text:?}")]
    BadIngredientLine {
        /// One-based line number within the ingredient field.
        line: usize,
        /// The offending line.
        text: String,
    },
}
