//! Core data structures for strikefit
//!
//! This module provides the observation panel and the leakage-free
//! preprocessing steps applied before any model is fitted.

mod builder;
mod covariate;
pub mod io;
mod panel;
mod split;
mod standardize;

#[cfg(test)]
mod tests;

// Re-exports
pub use builder::PanelBuilder;
pub use covariate::{Covariate, LATITUDE, LONGITUDE, STRIKES, YEAR};
pub use panel::Panel;
pub use split::{DatasetSplitter, Partition, DEFAULT_SEED, DEFAULT_TRAIN_FRACTION};
pub use standardize::{ColumnStats, StandardizationStats, Standardizer};

// Type aliases for common use cases
pub type FloatArray = ndarray::Array1<f64>;
pub type Matrix = ndarray::Array2<f64>;

/// Error types specific to data operations
#[derive(thiserror::Error, Debug)]
pub enum DataError {
    #[error("Not enough observations: {n} rows, at least {required} required")]
    InsufficientData { n: usize, required: usize },

    #[error("Degenerate variance in column '{column}': standard deviation is {std}")]
    DegenerateVariance { column: String, std: f64 },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Index out of bounds: index {index}, length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Missing value in column '{column}' at row {row}")]
    MissingData { column: String, row: usize },

    #[error("Cannot parse '{value}' in column '{column}' at row {row} as a number")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for data operations
pub type Result<T> = std::result::Result<T, DataError>;
