//! Linear regression models
//!
//! This module provides the ordinary least squares estimator and the
//! linear model family fitted over a covariate-subset schedule.
//!
//! Predictions are plain affine evaluations and are not constrained to be
//! positive.

pub mod ols;

#[cfg(test)]
mod tests;

// Re-exports
pub use ols::{LinearRegression, LinearRegressionResult};

use ndarray::Array1;
use tracing::debug;

use crate::base::{
    FamilyKind, FitDiagnostics, FittedModel, FunctionalForm, ModelFamily, ModelSpec, Predict,
    Result, coefficient_names, design_matrix,
};
use sf_core::Panel;

/// OLS fitted once per covariate subset
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearFamily;

impl LinearFamily {
    /// Create the family
    pub fn new() -> Self {
        Self
    }
}

/// Fitted OLS model
#[derive(Debug, Clone)]
pub struct LinearModel {
    fitted: FittedModel,
    beta: Array1<f64>,
}

impl LinearModel {
    /// Coefficient vector, intercept first
    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }
}

impl ModelFamily for LinearFamily {
    type Model = LinearModel;

    fn kind(&self) -> FamilyKind {
        FamilyKind::Linear
    }

    fn fit(&self, spec: &ModelSpec, train: &Panel) -> Result<LinearModel> {
        let x = design_matrix(train, &spec.covariates)?;
        let y = train.strikes()?;

        let result = LinearRegression::new().fit(&x, y)?;
        let coefficients = result.to_coefficients(&coefficient_names(&spec.covariates));

        debug!(
            model = %spec.id,
            r_squared = ?result.statistics.r_squared,
            "Fitted OLS model"
        );

        Ok(LinearModel {
            fitted: FittedModel {
                id: spec.id.clone(),
                family: FamilyKind::Linear,
                covariates: spec.covariates.clone(),
                form: FunctionalForm::Affine,
                coefficients,
                statistics: result.statistics,
                diagnostics: FitDiagnostics::default(),
            },
            beta: result.coefficients,
        })
    }
}

impl Predict for LinearModel {
    fn fitted(&self) -> &FittedModel {
        &self.fitted
    }

    fn predict(&self, data: &Panel) -> Result<Array1<f64>> {
        let x = design_matrix(data, &self.fitted.covariates)?;
        Ok(x.dot(&self.beta))
    }
}
