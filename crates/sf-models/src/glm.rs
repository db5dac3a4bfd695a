//! Gamma generalized linear models with a log link
//!
//! mean(strikes) = exp(a + b·x1 + …), fitted by IRLS over the same
//! covariate subsets as the linear family. Predictions are strictly
//! positive.

pub mod family;
pub mod irls;


pub use family::{GammaFamily, LogLink};
pub use irls::{IrlsConfig, IrlsResult, fit_gamma_glm};

use ndarray::Array1;
use tracing::{debug, warn};

use crate::base::{
    FamilyKind, FitDiagnostics, FitStatistics, FitWarning, FittedModel, FunctionalForm,
    ModelFamily, ModelSpec, Predict, Result, coefficient_names, coefficients_from, design_matrix,
};
use sf_core::Panel;

/// Gamma GLM fitted once per covariate subset
#[derive(Debug, Clone, Copy, Default)]
pub struct GammaGlmFamily {
    config: IrlsConfig,
}

impl GammaGlmFamily {
    /// Create the family with the given IRLS settings
    pub fn new(config: IrlsConfig) -> Self {
        Self { config }
    }
}

/// Fitted Gamma GLM
#[derive(Debug, Clone)]
pub struct GammaGlmModel {
    fitted: FittedModel,
    beta: Array1<f64>,
}

impl GammaGlmModel {
    /// Coefficients on the log scale, intercept first
    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }
}

impl ModelFamily for GammaGlmFamily {
    type Model = GammaGlmModel;

    fn kind(&self) -> FamilyKind {
        FamilyKind::GammaGlm
    }

    fn fit(&self, spec: &ModelSpec, train: &Panel) -> Result<GammaGlmModel> {
        let x = design_matrix(train, &spec.covariates)?;
        let y = train.strikes()?;

        let result = fit_gamma_glm(y, &x, &self.config)?;

        let family = GammaFamily;
        let n = y.len();
        let p = x.ncols();
        let df_residual = n - p;
        let dispersion = family.dispersion(y, &result.fitted_values, df_residual);

        let std_errors: Vec<f64> = result
            .covariance_unscaled
            .diag()
            .iter()
            .map(|&v| (dispersion * v).max(0.0).sqrt())
            .collect();
        let estimates = result.coefficients.to_vec();
        let coefficients = coefficients_from(
            &coefficient_names(&spec.covariates),
            &estimates,
            &std_errors,
            true,
        );

        // Intercept-only fit of a log-link GLM is the sample mean
        let y_mean = y.mean().unwrap_or(0.0);
        let null_deviance = family.deviance(y, &Array1::from_elem(n, y_mean));

        let mut diagnostics = FitDiagnostics::default();
        if !result.converged {
            warn!(
                model = %spec.id,
                iterations = result.iterations,
                "IRLS did not converge"
            );
            diagnostics.push(FitWarning::NotConverged {
                iterations: result.iterations,
            });
        }

        debug!(
            model = %spec.id,
            deviance = result.deviance,
            iterations = result.iterations,
            "Fitted Gamma GLM"
        );

        Ok(GammaGlmModel {
            fitted: FittedModel {
                id: spec.id.clone(),
                family: FamilyKind::GammaGlm,
                covariates: spec.covariates.clone(),
                form: FunctionalForm::LogLinear,
                coefficients,
                statistics: FitStatistics {
                    n_obs: n,
                    deviance: Some(result.deviance),
                    null_deviance: Some(null_deviance),
                    dispersion: Some(dispersion),
                    df_residual: Some(df_residual),
                    iterations: Some(result.iterations),
                    ..FitStatistics::default()
                },
                diagnostics,
            },
            beta: result.coefficients,
        })
    }
}

impl Predict for GammaGlmModel {
    fn fitted(&self) -> &FittedModel {
        &self.fitted
    }

    fn predict(&self, data: &Panel) -> Result<Array1<f64>> {
        let x = design_matrix(data, &self.fitted.covariates)?;
        // exp underflows to zero far in the tail
        Ok(x.dot(&self.beta).mapv(|eta| eta.exp().max(f64::MIN_POSITIVE)))
    }
}
