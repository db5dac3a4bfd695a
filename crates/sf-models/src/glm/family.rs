//! Gamma response family and log link
//!
//! Gamma: Var(Y) = φ·μ², unit deviance 2·[−ln(y/μ) + (y − μ)/μ].
//! Log link: η = ln μ, μ = exp η, g'(μ) = 1/μ.

use ndarray::Array1;

use crate::base::{ModelError, Result};

/// Smallest fitted mean kept during iteration
pub const MIN_MU: f64 = 1e-10;

/// Gamma distribution family
#[derive(Debug, Clone, Copy, Default)]
pub struct GammaFamily;

impl GammaFamily {
    /// Variance function V(μ) = μ²
    pub fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| m * m)
    }

    /// Every response must be strictly positive and finite
    pub fn validate(&self, y: &Array1<f64>) -> Result<()> {
        match y.iter().position(|&v| !(v > 0.0 && v.is_finite())) {
            Some(i) => Err(ModelError::InvalidResponse(format!(
                "Gamma response must be positive, found {} at row {}",
                y[i], i
            ))),
            None => Ok(()),
        }
    }

    /// Unit deviance of one observation
    #[inline]
    pub fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        2.0 * (-(y / mu).ln() + (y - mu) / mu)
    }

    /// Total deviance
    pub fn deviance(&self, y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| self.unit_deviance(yi, mi))
            .sum()
    }

    /// Pearson χ² over residual degrees of freedom
    pub fn dispersion(&self, y: &Array1<f64>, mu: &Array1<f64>, df_residual: usize) -> f64 {
        let chi2: f64 = y
            .iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| ((yi - mi) / mi).powi(2))
            .sum();
        chi2 / df_residual.max(1) as f64
    }

    /// Keep fitted means inside the support
    pub fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| if m.is_nan() { MIN_MU } else { m.max(MIN_MU) })
    }
}

/// Log link function
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLink;

impl LogLink {
    /// η = ln μ
    pub fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(f64::ln)
    }

    /// μ = exp η
    pub fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.mapv(f64::exp)
    }

    /// dη/dμ = 1/μ
    pub fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| 1.0 / m)
    }
}
