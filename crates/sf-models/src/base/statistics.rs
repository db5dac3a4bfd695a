//! Statistical structures for model results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fit statistics; each family fills the fields that apply to it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    /// Number of training observations used
    pub n_obs: usize,
    /// R-squared
    pub r_squared: Option<f64>,
    /// Residual standard error
    pub residual_std_error: Option<f64>,
    /// Residual sum of squares
    pub rss: Option<f64>,
    /// Log-likelihood
    pub log_likelihood: Option<f64>,
    /// AIC
    pub aic: Option<f64>,
    /// Residual deviance
    pub deviance: Option<f64>,
    /// Null deviance
    pub null_deviance: Option<f64>,
    /// Dispersion (scale) estimate
    pub dispersion: Option<f64>,
    /// Widely applicable information criterion
    pub waic: Option<f64>,
    /// Residual degrees of freedom
    pub df_residual: Option<usize>,
    /// Number of iterations
    pub iterations: Option<usize>,
}

/// Reportable, non-fatal problems found while fitting or predicting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitWarning {
    /// The optimizer stopped at its iteration limit
    NotConverged {
        /// Iterations performed
        iterations: usize,
    },
    /// A posterior parameter failed the R-hat / ESS checks
    PoorMixing {
        /// Parameter name
        parameter: String,
        /// Split R-hat
        r_hat: f64,
        /// Bulk effective sample size
        ess: f64,
    },
    /// Sampler trajectories diverged
    Divergences {
        /// Number of divergent transitions after warmup
        count: usize,
    },
    /// Points answered by the global-mean fallback
    OutOfRangeFallback {
        /// Number of points
        count: usize,
    },
    /// Points where a shape or rate fell outside its support
    ClampedSupport {
        /// Number of points
        count: usize,
    },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::NotConverged { iterations } => {
                write!(f, "did not converge after {} iterations", iterations)
            }
            FitWarning::PoorMixing {
                parameter,
                r_hat,
                ess,
            } => write!(
                f,
                "poor mixing for {}: R-hat {:.3}, ESS {:.0}",
                parameter, r_hat, ess
            ),
            FitWarning::Divergences { count } => {
                write!(f, "{} divergent transitions", count)
            }
            FitWarning::OutOfRangeFallback { count } => {
                write!(f, "{} points fell back to the global mean", count)
            }
            FitWarning::ClampedSupport { count } => {
                write!(f, "{} points had a non-positive shape or rate", count)
            }
        }
    }
}

/// Convergence state of a fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Did the fitting procedure converge?
    pub converged: bool,
    /// Non-fatal warnings
    pub warnings: Vec<FitWarning>,
}

impl Default for FitDiagnostics {
    fn default() -> Self {
        Self {
            converged: true,
            warnings: Vec::new(),
        }
    }
}

impl FitDiagnostics {
    /// Record a warning; convergence-type warnings clear `converged`
    pub fn push(&mut self, warning: FitWarning) {
        if matches!(
            warning,
            FitWarning::NotConverged { .. } | FitWarning::PoorMixing { .. }
        ) {
            self.converged = false;
        }
        self.warnings.push(warning);
    }

    /// Whether any warning was recorded
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
