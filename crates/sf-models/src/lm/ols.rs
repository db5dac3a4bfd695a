//! Ordinary Least Squares (OLS) linear regression
//!
//! This module implements the standard linear regression estimator on a
//! prepared design matrix. It backs the linear family and the log-log and
//! scale fits of the power-law family.

use ndarray::{Array1, Array2};
use std::f64::consts::PI;

use crate::base::{Coefficient, FitStatistics, ModelError, Result, coefficients_from};
use crate::linalg::{invert_spd, least_squares};

// ==================== Type Definitions ====================

/// Matrix type alias for 2D arrays
pub type Matrix = Array2<f64>;

/// Vector type alias for 1D arrays
pub type Vector = Array1<f64>;

// ==================== Linear Regression Result ====================

/// OLS linear regression result
#[derive(Debug, Clone)]
pub struct LinearRegressionResult {
    /// Coefficients (β)
    pub coefficients: Vector,
    /// Standard errors of coefficients
    pub standard_errors: Vector,
    /// Fitted values (ŷ)
    pub fitted_values: Vector,
    /// Residuals (y - ŷ)
    pub residuals: Vector,
    /// Fit statistics
    pub statistics: FitStatistics,
    /// Has intercept
    pub has_intercept: bool,
}

impl LinearRegressionResult {
    /// Convert coefficients to Coefficient structs
    pub fn to_coefficients(&self, names: &[String]) -> Vec<Coefficient> {
        coefficients_from(
            names,
            self.coefficients.as_slice().unwrap_or(&[]),
            self.standard_errors.as_slice().unwrap_or(&[]),
            self.has_intercept,
        )
    }

    /// Get the number of observations
    pub fn n_obs(&self) -> usize {
        self.fitted_values.len()
    }

    /// Get the number of predictors (including intercept)
    pub fn n_predictors(&self) -> usize {
        self.coefficients.len()
    }
}

// ==================== Linear Regression Model ====================

/// OLS linear regression estimator
#[derive(Debug, Clone, Copy)]
pub struct LinearRegression {
    /// Whether the first design column is the intercept
    has_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new estimator for a design with a leading intercept column
    pub fn new() -> Self {
        Self {
            has_intercept: true,
        }
    }

    /// Declare that the design has no intercept column
    pub fn no_intercept(mut self) -> Self {
        self.has_intercept = false;
        self
    }

    /// Fit the OLS model
    pub fn fit(&self, x: &Matrix, y: &Vector) -> Result<LinearRegressionResult> {
        let n = x.nrows();
        let p = x.ncols();

        if y.len() != n {
            return Err(ModelError::LengthMismatch {
                left: n,
                right: y.len(),
            });
        }

        if n <= p {
            return Err(ModelError::InsufficientData {
                n_samples: n,
                n_parameters: p,
            });
        }

        // Fit using SVD (numerically stable)
        let coefficients = least_squares(x, y)?;

        // Calculate fitted values and residuals
        let fitted_values = x.dot(&coefficients);
        let residuals = y - &fitted_values;

        // Calculate basic statistics
        let rss = residuals.mapv(|r| r * r).sum();
        let df_residual = n - p;
        let residual_std_error = (rss / df_residual as f64).sqrt();

        let y_mean = y.mean().unwrap_or(0.0);
        let tss: f64 = if self.has_intercept {
            y.iter().map(|&yi| (yi - y_mean).powi(2)).sum()
        } else {
            y.iter().map(|&yi| yi * yi).sum()
        };
        let r_squared = (tss > 0.0).then(|| 1.0 - rss / tss);

        let standard_errors = self.standard_errors(x, rss, df_residual)?;

        // Gaussian log-likelihood at the ML variance; σ counts as a parameter
        let nf = n as f64;
        let log_likelihood = -0.5 * nf * ((2.0 * PI).ln() + (rss / nf).ln() + 1.0);
        let aic = 2.0 * (p + 1) as f64 - 2.0 * log_likelihood;

        let statistics = FitStatistics {
            n_obs: n,
            r_squared,
            residual_std_error: Some(residual_std_error),
            rss: Some(rss),
            log_likelihood: log_likelihood.is_finite().then_some(log_likelihood),
            aic: aic.is_finite().then_some(aic),
            df_residual: Some(df_residual),
            ..FitStatistics::default()
        };

        Ok(LinearRegressionResult {
            coefficients,
            standard_errors,
            fitted_values,
            residuals,
            statistics,
            has_intercept: self.has_intercept,
        })
    }

    /// Calculate standard errors
    fn standard_errors(&self, x: &Matrix, rss: f64, df_residual: usize) -> Result<Vector> {
        // (X'X)^{-1}
        let xtx = x.t().dot(x);
        let xtx_inv = invert_spd(&xtx)?;

        // σ² = RSS / (n - p)
        let sigma2 = rss / df_residual as f64;

        // Standard errors = sqrt(diag(σ² * (X'X)^{-1}))
        Ok(xtx_inv.diag().mapv(|v| (sigma2 * v).max(0.0).sqrt()))
    }
}
