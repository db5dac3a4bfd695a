//! Train-only standardization of predictor covariates
//!
//! Statistics are always computed from the training partition and then
//! applied unchanged to both partitions. The response column is never
//! touched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::*;

/// Location and scale of one covariate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Training mean
    pub mean: f64,
    /// Training sample standard deviation (ddof = 1)
    pub std: f64,
}

impl ColumnStats {
    /// Standardize a single value
    #[inline]
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// Per-covariate statistics computed from the training partition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StandardizationStats {
    stats: IndexMap<Covariate, ColumnStats>,
}

impl StandardizationStats {
    /// Statistics for one covariate
    pub fn get(&self, covariate: Covariate) -> Option<&ColumnStats> {
        self.stats.get(&covariate)
    }

    /// Covariates covered, in fit order
    pub fn covariates(&self) -> impl Iterator<Item = Covariate> + '_ {
        self.stats.keys().copied()
    }

    /// Number of covariates covered
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether no covariate is covered
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Return a copy of `panel` with every covered covariate standardized
    pub fn apply(&self, panel: &Panel) -> Result<Panel> {
        let mut out = panel.clone();

        for (&covariate, stats) in &self.stats {
            let standardized = panel.covariate(covariate)?.mapv(|v| stats.transform(v));
            out.replace_column(covariate.column(), standardized)?;
        }

        Ok(out)
    }
}

/// Fits and applies [`StandardizationStats`]
pub struct Standardizer;

impl Standardizer {
    /// Compute mean and sample standard deviation of each covariate over `train`
    pub fn fit(train: &Panel, covariates: &[Covariate]) -> Result<StandardizationStats> {
        if train.nrows() < 2 {
            return Err(DataError::InsufficientData {
                n: train.nrows(),
                required: 2,
            });
        }

        let mut stats = IndexMap::with_capacity(covariates.len());

        for &covariate in covariates {
            if stats.contains_key(&covariate) {
                continue;
            }

            let values = train.covariate(covariate)?;
            let mean = values.mean().unwrap_or(f64::NAN);
            let std = values.std(1.0);

            if !(std.is_finite() && std > 0.0) {
                return Err(DataError::DegenerateVariance {
                    column: covariate.column().to_string(),
                    std,
                });
            }

            stats.insert(covariate, ColumnStats { mean, std });
        }

        Ok(StandardizationStats { stats })
    }

    /// Apply previously fitted statistics
    pub fn apply(stats: &StandardizationStats, data: &Panel) -> Result<Panel> {
        stats.apply(data)
    }
}
