//! Two-parameter nonlinear least squares
//!
//! Levenberg–Marquardt: each step solves (J'J + λ·diag(J'J)) δ = J'r and
//! shrinks λ after an improving step, grows it otherwise. When no step
//! improves the fit any more the run is converged only if the scaled
//! gradient J'r vanishes.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::base::{ModelError, Result};
use crate::linalg::{invert_spd, solve_and_invert};

/// Levenberg–Marquardt settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlsConfig {
    /// Maximum number of accepted or rejected steps. Default: 200
    pub max_iterations: usize,
    /// Relative RSS change that counts as converged. Default: 1e-10
    pub tolerance: f64,
    /// Starting damping factor. Default: 1e-3
    pub initial_lambda: f64,
    /// Largest cosine between r and a Jacobian column at a stall. Default: 1e-6
    pub gradient_tolerance: f64,
}

impl Default for NlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_lambda: 1e-3,
            gradient_tolerance: 1e-6,
        }
    }
}

/// Output of a nonlinear least-squares fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlsResult {
    /// Estimated (a, b)
    pub params: [f64; 2],
    /// Asymptotic standard errors from σ²(J'J)⁻¹
    pub std_errors: [f64; 2],
    /// Residual sum of squares
    pub rss: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether the tolerance was met
    pub converged: bool,
}

/// Residual sum of squares and Jacobian of `model` at `params`
fn evaluate<F>(x: &[f64], y: &[f64], params: &[f64; 2], model: &F) -> (f64, Array1<f64>, Array2<f64>)
where
    F: Fn(f64, &[f64; 2]) -> (f64, [f64; 2]),
{
    let n = x.len();
    let mut residuals = Array1::zeros(n);
    let mut jacobian = Array2::zeros((n, 2));

    for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        let (value, grad) = model(xi, params);
        residuals[i] = yi - value;
        jacobian[[i, 0]] = grad[0];
        jacobian[[i, 1]] = grad[1];
    }

    (residuals.mapv(|r| r * r).sum(), residuals, jacobian)
}

/// Whether `params` is a stationary point of the RSS
///
/// Residuals at rounding level of `y` count as an exact fit.
fn is_stationary(y: &[f64], residuals: &Array1<f64>, jacobian: &Array2<f64>, tolerance: f64) -> bool {
    let rss = residuals.dot(residuals);
    let scale: f64 = y.iter().map(|v| v * v).sum();
    if rss <= f64::EPSILON * scale {
        return true;
    }

    let r_norm = rss.sqrt();
    let jtr = jacobian.t().dot(residuals);
    jacobian.columns().into_iter().zip(jtr.iter()).all(|(column, g)| {
        let column_norm = column.dot(&column).sqrt();
        column_norm == 0.0 || (g / (column_norm * r_norm)).abs() <= tolerance
    })
}

/// Fit y ≈ f(x; a, b), where `model` returns f and (∂f/∂a, ∂f/∂b)
pub fn levenberg_marquardt<F>(
    x: &[f64],
    y: &[f64],
    start: [f64; 2],
    model: F,
    config: &NlsConfig,
) -> Result<NlsResult>
where
    F: Fn(f64, &[f64; 2]) -> (f64, [f64; 2]),
{
    if x.len() != y.len() {
        return Err(ModelError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    let n = x.len();
    if n <= 2 {
        return Err(ModelError::InsufficientData {
            n_samples: n,
            n_parameters: 2,
        });
    }

    let mut params = start;
    let (mut rss, mut residuals, mut jacobian) = evaluate(x, y, &params, &model);
    if !rss.is_finite() {
        return Err(ModelError::NumericalError {
            message: "residuals are not finite at the starting values".to_string(),
            operation: "levenberg_marquardt".to_string(),
        });
    }

    let mut lambda = config.initial_lambda;
    let mut converged = false;
    let mut iteration = 0;

    while iteration < config.max_iterations {
        iteration += 1;

        let jtj = jacobian.t().dot(&jacobian);
        let jtr = jacobian.t().dot(&residuals);

        let mut damped = jtj.clone();
        for j in 0..2 {
            damped[[j, j]] += lambda * jtj[[j, j]].max(1e-12);
        }

        let step = match solve_and_invert(&damped, &jtr) {
            Ok((step, _)) => step,
            Err(_) => {
                lambda *= 10.0;
                continue;
            }
        };
        let candidate = [params[0] + step[0], params[1] + step[1]];
        if candidate == params {
            converged = is_stationary(y, &residuals, &jacobian, config.gradient_tolerance);
            break;
        }
        let (candidate_rss, candidate_residuals, candidate_jacobian) =
            evaluate(x, y, &candidate, &model);

        if candidate_rss.is_finite() && candidate_rss <= rss {
            let change = (rss - candidate_rss) / rss.max(f64::MIN_POSITIVE);
            params = candidate;
            rss = candidate_rss;
            residuals = candidate_residuals;
            jacobian = candidate_jacobian;
            lambda = (lambda / 10.0).max(1e-12);

            if change < config.tolerance {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            // No step of any length improves the fit
            if lambda > 1e16 {
                converged = is_stationary(y, &residuals, &jacobian, config.gradient_tolerance);
                break;
            }
        }
    }

    if !(params[0].is_finite() && params[1].is_finite()) {
        return Err(ModelError::NumericalError {
            message: format!("non-finite parameters ({}, {})", params[0], params[1]),
            operation: "levenberg_marquardt".to_string(),
        });
    }

    let sigma2 = rss / (n - 2) as f64;
    let std_errors = match invert_spd(&jacobian.t().dot(&jacobian)) {
        Ok(cov) => [
            (sigma2 * cov[[0, 0]]).max(0.0).sqrt(),
            (sigma2 * cov[[1, 1]]).max(0.0).sqrt(),
        ],
        Err(_) => [f64::NAN, f64::NAN],
    };

    debug!(iteration, rss, converged, "Levenberg-Marquardt finished");

    Ok(NlsResult {
        params,
        std_errors,
        rss,
        iterations: iteration,
        converged,
    })
}
