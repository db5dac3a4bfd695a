//! Non-parametric binned-mean model over CAPE×P
//!
//! The training CAPE×P range is cut into equal-width bins, each holding the
//! mean training strike rate of its rows. Bin i covers `[e_i, e_{i+1})`, the
//! last bin `[e_{n-1}, e_n]`, so the training maximum lands in the last bin.
//!
//! Extrapolation policy: a point outside the training range, or in a bin
//! no training row fell into, is answered with the global training mean.

use ndarray::Array1;
use tracing::{debug, info};

use crate::base::{
    FamilyKind, FitDiagnostics, FitStatistics, FitWarning, FittedModel, FunctionalForm,
    ModelError, ModelFamily, ModelSpec, Predict, Result,
};
use crate::metrics::BinEdges;
use sf_core::{Covariate, Panel};

/// Default number of bins
pub const DEFAULT_BIN_COUNT: usize = 50;

/// Identifier of the binned model
pub const BINNED_ID: &str = "NP";

/// Identifier and covariate of the binned model
pub fn binned_spec() -> ModelSpec {
    ModelSpec::new(BINNED_ID, vec![Covariate::CapeXPrecip])
}

/// Binned-mean lookup table
#[derive(Debug, Clone, Copy)]
pub struct NonParametricBinFamily {
    nbins: usize,
}

impl Default for NonParametricBinFamily {
    fn default() -> Self {
        Self::new(DEFAULT_BIN_COUNT)
    }
}

impl NonParametricBinFamily {
    /// Family with `nbins` bins
    pub fn new(nbins: usize) -> Self {
        Self { nbins }
    }
}

impl ModelFamily for NonParametricBinFamily {
    type Model = BinnedMeanModel;

    fn kind(&self) -> FamilyKind {
        FamilyKind::NonParametric
    }

    fn fit(&self, spec: &ModelSpec, train: &Panel) -> Result<BinnedMeanModel> {
        let x = train.covariate(Covariate::CapeXPrecip)?;
        let y = train.strikes()?;

        let global_mean = y
            .mean()
            .ok_or_else(|| ModelError::EmptyInput("training panel is empty".to_string()))?;

        let (min, max) = x.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        let edges = BinEdges::new(min, max, self.nbins)?;

        let mut sums = vec![0.0; self.nbins];
        let mut counts = vec![0usize; self.nbins];
        for (&xi, &yi) in x.iter().zip(y.iter()) {
            if let Some(bin) = edges.bin_of(xi) {
                sums[bin] += yi;
                counts[bin] += 1;
            }
        }
        let means: Vec<Option<f64>> = sums
            .iter()
            .zip(&counts)
            .map(|(&s, &c)| (c > 0).then(|| s / c as f64))
            .collect();

        let empty = means.iter().filter(|m| m.is_none()).count();
        debug!(
            model = %spec.id,
            bins = self.nbins,
            empty_bins = empty,
            min,
            max,
            "Built binned-mean table"
        );

        Ok(BinnedMeanModel {
            fitted: FittedModel {
                id: spec.id.clone(),
                family: FamilyKind::NonParametric,
                covariates: spec.covariates.clone(),
                form: FunctionalForm::BinnedMean,
                coefficients: Vec::new(),
                statistics: FitStatistics {
                    n_obs: y.len(),
                    ..FitStatistics::default()
                },
                diagnostics: FitDiagnostics::default(),
            },
            edges,
            means,
            global_mean,
        })
    }
}

/// Fitted binned-mean table
#[derive(Debug, Clone)]
pub struct BinnedMeanModel {
    fitted: FittedModel,
    edges: BinEdges,
    means: Vec<Option<f64>>,
    global_mean: f64,
}

impl BinnedMeanModel {
    /// Bin edges from the training range
    pub fn edges(&self) -> &BinEdges {
        &self.edges
    }

    /// Mean strike rate per bin; `None` for empty bins
    pub fn bin_means(&self) -> &[Option<f64>] {
        &self.means
    }

    /// Training mean used as fallback
    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Lookup of one value; `None` when the fallback answered
    pub fn lookup(&self, x: f64) -> Option<f64> {
        self.edges.bin_of(x).and_then(|bin| self.means[bin])
    }

    /// Predictions and the number of fallback answers
    pub fn predict_counting(&self, data: &Panel) -> Result<(Array1<f64>, usize)> {
        let x = data.covariate(Covariate::CapeXPrecip)?;
        let mut fallbacks = 0;
        let predictions = x.mapv(|v| {
            self.lookup(v).unwrap_or_else(|| {
                fallbacks += 1;
                self.global_mean
            })
        });
        Ok((predictions, fallbacks))
    }
}

impl Predict for BinnedMeanModel {
    fn fitted(&self) -> &FittedModel {
        &self.fitted
    }

    fn predict(&self, data: &Panel) -> Result<Array1<f64>> {
        self.predict_counting(data).map(|(p, _)| p)
    }

    fn predict_with_warnings(&self, data: &Panel) -> Result<(Array1<f64>, Vec<FitWarning>)> {
        let (predictions, fallbacks) = self.predict_counting(data)?;
        let mut warnings = Vec::new();
        if fallbacks > 0 {
            info!(model = %self.fitted.id, fallbacks, "Points answered by the global mean");
            warnings.push(FitWarning::OutOfRangeFallback { count: fallbacks });
        }
        Ok((predictions, warnings))
    }
}
