//! Model-related error types

use thiserror::Error;

use sf_core::DataError;

/// Model-related errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Data-related error (partitioning, standardization, missing columns)
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Correlation is undefined for a constant series
    #[error("Zero variance in {series} series: correlation is undefined")]
    ZeroVariance {
        /// Which series was constant ("observed" or "predicted")
        series: &'static str,
    },

    /// Empty input where at least one value is needed
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Paired series of different lengths
    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the first series
        left: usize,
        /// Length of the second series
        right: usize,
    },

    /// Insufficient data for model fitting
    #[error("Not enough data: {n_samples} samples for {n_parameters} parameters")]
    InsufficientData {
        /// Number of samples
        n_samples: usize,
        /// Number of parameters
        n_parameters: usize,
    },

    /// Singular matrix encountered
    #[error("Singular matrix encountered in {0}")]
    SingularMatrix(&'static str),

    /// Numerical computation error
    #[error("Numerical error: {message} (operation: {operation})")]
    NumericalError {
        /// Error message
        message: String,
        /// Operation that failed
        operation: String,
    },

    /// Response values outside the support of the likelihood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Posterior sampler failure
    #[error("Sampler error: {0}")]
    Sampler(String),

    /// Invalid model configuration
    #[error("Invalid model configuration: {message}")]
    InvalidConfig {
        /// Configuration error message
        message: String,
    },

    /// I/O failure while exporting results
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV failure while exporting results
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
