//! Data layer for strike-rate model comparison
//!
//! Holds the observation panel, the covariate vocabulary, the seeded
//! train/test partition and the train-only standardization statistics
//! shared by every model family in `sf-models`.

pub mod data;

pub use data::{
    ColumnStats, Covariate, DataError, DatasetSplitter, FloatArray, Matrix, Panel, PanelBuilder,
    Partition, StandardizationStats, Standardizer,
};
