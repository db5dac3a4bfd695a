//! Skill metrics shared by every model family
//!
//! - RMSE
//! - Pearson correlation
//! - Perkins S-score: overlap of the observed and predicted histograms,
//!   both binned on edges taken from the pooled range of the two series.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::base::{ModelError, Result};

/// Default number of S-score bins
pub const DEFAULT_SSCORE_BINS: usize = 15;
/// S-score bins used for the CAPE×P (Chen and binned) models
pub const BIN_MODEL_SSCORE_BINS: usize = 50;

fn check_pair(observed: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Result<()> {
    if observed.len() != predicted.len() {
        return Err(ModelError::LengthMismatch {
            left: observed.len(),
            right: predicted.len(),
        });
    }
    if observed.is_empty() {
        return Err(ModelError::EmptyInput("no values to score".to_string()));
    }
    Ok(())
}

/// Root mean squared error
pub fn rmse(observed: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Result<f64> {
    check_pair(observed, predicted)?;

    let sse: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| (o - p).powi(2))
        .sum();

    Ok((sse / observed.len() as f64).sqrt())
}

/// Pearson product-moment correlation
pub fn correlation(observed: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Result<f64> {
    check_pair(observed, predicted)?;

    let n = observed.len() as f64;
    let mean_o = observed.sum() / n;
    let mean_p = predicted.sum() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (o, p) in observed.iter().zip(predicted.iter()) {
        let (dx, dy) = (o - mean_o, p - mean_p);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return Err(ModelError::ZeroVariance { series: "observed" });
    }
    if syy == 0.0 {
        return Err(ModelError::ZeroVariance { series: "predicted" });
    }

    Ok((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Equal-width bin edges over a closed range
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    min: f64,
    max: f64,
    nbins: usize,
}

impl BinEdges {
    /// Edges spanning `[min, max]` in `nbins` equal-width bins
    pub fn new(min: f64, max: f64, nbins: usize) -> Result<Self> {
        if nbins == 0 {
            return Err(ModelError::InvalidConfig {
                message: "number of bins must be positive".to_string(),
            });
        }
        if !(min.is_finite() && max.is_finite()) || max < min {
            return Err(ModelError::NumericalError {
                message: format!("invalid bin range [{}, {}]", min, max),
                operation: "bin_edges".to_string(),
            });
        }
        Ok(Self { min, max, nbins })
    }

    /// Number of bins
    pub fn nbins(&self) -> usize {
        self.nbins
    }

    /// Lower edge of bin `i` (`i == nbins` gives the upper bound)
    pub fn edge(&self, i: usize) -> f64 {
        if i >= self.nbins {
            return self.max;
        }
        self.min + (self.max - self.min) * i as f64 / self.nbins as f64
    }

    /// Bin of `value`: `[e_i, e_{i+1})`, the last bin closed on both ends.
    /// `None` outside `[min, max]`.
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        if !(value >= self.min && value <= self.max) {
            return None;
        }
        if self.max == self.min {
            return Some(0);
        }
        if value == self.max {
            return Some(self.nbins - 1);
        }

        let width = (self.max - self.min) / self.nbins as f64;
        let mut bin = (((value - self.min) / width).floor() as usize).min(self.nbins - 1);

        // Pin values lying exactly on a rounded interior edge
        if value < self.edge(bin) {
            bin -= 1;
        } else if bin + 1 < self.nbins && value >= self.edge(bin + 1) {
            bin += 1;
        }
        Some(bin)
    }

    /// Histogram of `values` as probabilities (count / total)
    pub fn probabilities(&self, values: ArrayView1<f64>) -> Vec<f64> {
        let mut counts = vec![0usize; self.nbins];
        let mut total = 0usize;
        for &v in values.iter() {
            if let Some(bin) = self.bin_of(v) {
                counts[bin] += 1;
                total += 1;
            }
        }

        if total == 0 {
            return vec![0.0; self.nbins];
        }
        counts
            .into_iter()
            .map(|c| c as f64 / total as f64)
            .collect()
    }
}

/// Perkins S-score over `nbins` bins on the pooled range
pub fn s_score(observed: ArrayView1<f64>, predicted: ArrayView1<f64>, nbins: usize) -> Result<f64> {
    if observed.is_empty() || predicted.is_empty() {
        return Err(ModelError::EmptyInput("no values to score".to_string()));
    }
    if observed.iter().chain(predicted.iter()).any(|v| !v.is_finite()) {
        return Err(ModelError::NumericalError {
            message: "non-finite value in S-score input".to_string(),
            operation: "s_score".to_string(),
        });
    }

    let (min, max) = observed
        .iter()
        .chain(predicted.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    // One set of edges for both series
    let edges = BinEdges::new(min, max, nbins)?;
    let p_obs = edges.probabilities(observed);
    let p_pred = edges.probabilities(predicted);

    let score: f64 = p_obs
        .iter()
        .zip(p_pred.iter())
        .map(|(a, b)| a.min(*b))
        .sum();

    Ok(score.clamp(0.0, 1.0))
}

/// Metrics of one model against the test partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillScores {
    /// Root mean squared error
    pub rmse: f64,
    /// Pearson correlation; `None` when a series is constant
    pub correlation: Option<f64>,
    /// Perkins S-score
    pub s_score: f64,
}

/// Scores predictions with a fixed S-score bin count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillScorer {
    /// Number of S-score bins
    pub nbins: usize,
}

impl Default for SkillScorer {
    fn default() -> Self {
        Self {
            nbins: DEFAULT_SSCORE_BINS,
        }
    }
}

impl SkillScorer {
    /// Scorer with `nbins` S-score bins
    pub fn new(nbins: usize) -> Self {
        Self { nbins }
    }

    /// Compute every metric; an undefined correlation is reported as `None`
    pub fn score(&self, observed: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Result<SkillScores> {
        let rmse = rmse(observed, predicted)?;
        let correlation = match correlation(observed, predicted) {
            Ok(r) => Some(r),
            Err(e @ ModelError::ZeroVariance { .. }) => {
                warn!(error = %e, "Correlation undefined");
                None
            }
            Err(e) => return Err(e),
        };
        let s_score = s_score(observed, predicted, self.nbins)?;

        Ok(SkillScores {
            rmse,
            correlation,
            s_score,
        })
    }
}
