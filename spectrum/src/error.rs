//! Error types returned by the comparison engine.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, for instance an unknown uncertainty scheme or partition bounds that
    /// do not fit the ensemble.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Two binnings can not be brought into agreement.
    #[error("binning error: {0}")]
    Binning(String),
    /// Returned when the number of bins of two inputs do not agree.
    #[error("{what} has {found} bins, expected {expected}")]
    SizeMismatch {
        /// Description of the offending input.
        what: &'static str,
        /// Number of bins that were required.
        expected: usize,
        /// Number of bins that were found.
        found: usize,
    },
    /// A calculation is numerically impossible, for example the inversion of a singular matrix.
    #[error("numerical error: {0}")]
    Numerical(String),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
