//! Chen-style CAPE×P models
//!
//! Four parametric fits map x = CAPE×P to the strike rate on raw
//! (unstandardized) units, plus an ensemble:
//!
//! | id | form | fit |
//! |----|------|-----|
//! | C1 | y = exp(a + b·ln x) | OLS of ln(y + ε) on ln x, rows with x ≤ 0 dropped |
//! | C2 | y = a·x^b | Levenberg–Marquardt from (1, 1), rows with x < 0 dropped |
//! | C3 | y = a·x | slope of the OLS fit y ~ 1 + x, intercept discarded |
//! | C4 | y = a·x + b | Levenberg–Marquardt from (1, 1) |
//! | C5 | mean of C1, C2, C3 and the binned model | |
//!
//! C4 is fitted and predicted but never enters C5, and is left out of the
//! performance and parameter tables.

pub mod nls;

#[cfg(test)]
mod tests;

pub use nls::{NlsConfig, NlsResult, levenberg_marquardt};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::base::{
    BoxedModel, Coefficient, FamilyKind, FitDiagnostics, FitStatistics, FitWarning, FittedModel,
    FunctionalForm, ModelError, ModelFamily, ModelSpec, Predict, Result,
};
use crate::lm::LinearRegression;
use sf_core::{Covariate, Panel};

/// Default ε added to y before taking logs in C1
pub const DEFAULT_LOG_EPSILON: f64 = 1e-4;

/// The parametric sub-models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerLawKind {
    /// C1: log-log OLS
    LogLog,
    /// C2: power law by nonlinear least squares
    Nonlinear,
    /// C3: scale, OLS slope
    Scale,
    /// C4: straight line by nonlinear least squares
    Linear,
}

impl PowerLawKind {
    /// All sub-models in numbering order
    pub const ALL: [PowerLawKind; 4] = [
        PowerLawKind::LogLog,
        PowerLawKind::Nonlinear,
        PowerLawKind::Scale,
        PowerLawKind::Linear,
    ];

    /// Model identifier
    pub fn id(&self) -> &'static str {
        match self {
            PowerLawKind::LogLog => "C1",
            PowerLawKind::Nonlinear => "C2",
            PowerLawKind::Scale => "C3",
            PowerLawKind::Linear => "C4",
        }
    }

    /// Sub-model for an identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Functional form tag
    pub fn form(&self) -> FunctionalForm {
        match self {
            PowerLawKind::LogLog => FunctionalForm::LogLogPowerLaw,
            PowerLawKind::Nonlinear => FunctionalForm::PowerLaw,
            PowerLawKind::Scale => FunctionalForm::Scale,
            PowerLawKind::Linear => FunctionalForm::Linear,
        }
    }

    /// Whether the sub-model feeds the ensemble and the summary tables
    pub fn is_reported(&self) -> bool {
        !matches!(self, PowerLawKind::Linear)
    }
}

/// Identifier of the ensemble mean
pub const ENSEMBLE_ID: &str = "C5";

/// Specs of C1..C4, all on CAPE×P
pub fn power_law_schedule() -> Vec<ModelSpec> {
    PowerLawKind::ALL
        .iter()
        .map(|kind| ModelSpec::new(kind.id(), vec![Covariate::CapeXPrecip]))
        .collect()
}

/// Settings of the parametric fits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerLawConfig {
    /// ε of ln(y + ε) in C1
    pub log_epsilon: f64,
    /// Levenberg–Marquardt settings of C2 and C4
    pub nls: NlsConfig,
}

impl Default for PowerLawConfig {
    fn default() -> Self {
        Self {
            log_epsilon: DEFAULT_LOG_EPSILON,
            nls: NlsConfig::default(),
        }
    }
}

/// C1..C4 over CAPE×P
#[derive(Debug, Clone, Copy, Default)]
pub struct ParametricPowerLawFamily {
    config: PowerLawConfig,
}

impl ParametricPowerLawFamily {
    /// Create the family
    pub fn new(config: PowerLawConfig) -> Self {
        Self { config }
    }

    /// Fit one sub-model on the training panel
    pub fn fit_kind(&self, kind: PowerLawKind, train: &Panel) -> Result<PowerLawModel> {
        let x = train.covariate(Covariate::CapeXPrecip)?;
        let y = train.strikes()?;

        let mut diagnostics = FitDiagnostics::default();
        let (params, std_errors, statistics) = match kind {
            PowerLawKind::LogLog => self.fit_log_log(x, y)?,
            PowerLawKind::Scale => fit_scale(x, y)?,
            PowerLawKind::Nonlinear | PowerLawKind::Linear => {
                let result = self.fit_nls(kind, x, y)?;
                if !result.converged {
                    warn!(
                        model = kind.id(),
                        iterations = result.iterations,
                        "Nonlinear least squares did not converge"
                    );
                    diagnostics.push(FitWarning::NotConverged {
                        iterations: result.iterations,
                    });
                }
                let statistics = FitStatistics {
                    n_obs: nls_rows(kind, x),
                    rss: Some(result.rss),
                    iterations: Some(result.iterations),
                    ..FitStatistics::default()
                };
                (result.params, result.std_errors, statistics)
            }
        };

        debug!(model = kind.id(), a = params[0], b = params[1], "Fitted power-law model");

        let mut coefficients = vec![Coefficient::new("a", params[0]).with_std_error(std_errors[0])];
        if kind != PowerLawKind::Scale {
            coefficients.push(Coefficient::new("b", params[1]).with_std_error(std_errors[1]));
        }

        Ok(PowerLawModel {
            fitted: FittedModel {
                id: kind.id().to_string(),
                family: FamilyKind::PowerLaw,
                covariates: vec![Covariate::CapeXPrecip],
                form: kind.form(),
                coefficients,
                statistics,
                diagnostics,
            },
            kind,
            params,
        })
    }

    /// C1: OLS of ln(y + ε) on ln x over rows with x > 0
    fn fit_log_log(&self, x: &Array1<f64>, y: &Array1<f64>) -> Result<([f64; 2], [f64; 2], FitStatistics)> {
        let rows: Vec<(f64, f64)> = x
            .iter()
            .zip(y.iter())
            .filter(|(xi, _)| **xi > 0.0)
            .map(|(&xi, &yi)| (xi.ln(), (yi + self.config.log_epsilon).ln()))
            .collect();

        if rows.iter().any(|(_, ly)| !ly.is_finite()) {
            return Err(ModelError::InvalidResponse(format!(
                "ln(y + {}) is undefined for some training rows",
                self.config.log_epsilon
            )));
        }

        let design = Array2::from_shape_fn((rows.len(), 2), |(i, j)| if j == 0 { 1.0 } else { rows[i].0 });
        let response = Array1::from_iter(rows.iter().map(|(_, ly)| *ly));
        let result = LinearRegression::new().fit(&design, &response)?;

        Ok((
            [result.coefficients[0], result.coefficients[1]],
            [result.standard_errors[0], result.standard_errors[1]],
            result.statistics,
        ))
    }

    /// C2 / C4 by Levenberg–Marquardt from (1, 1)
    fn fit_nls(&self, kind: PowerLawKind, x: &Array1<f64>, y: &Array1<f64>) -> Result<NlsResult> {
        let (xs, ys): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y.iter())
            .filter(|(xi, _)| kind != PowerLawKind::Nonlinear || **xi >= 0.0)
            .map(|(&xi, &yi)| (xi, yi))
            .unzip();

        match kind {
            PowerLawKind::Nonlinear => {
                levenberg_marquardt(&xs, &ys, [1.0, 1.0], power_law_with_gradient, &self.config.nls)
            }
            _ => levenberg_marquardt(
                &xs,
                &ys,
                [1.0, 1.0],
                |x, p| (p[0] * x + p[1], [x, 1.0]),
                &self.config.nls,
            ),
        }
    }
}

/// Training rows used by the NLS fits
fn nls_rows(kind: PowerLawKind, x: &Array1<f64>) -> usize {
    match kind {
        PowerLawKind::Nonlinear => x.iter().filter(|&&v| v >= 0.0).count(),
        _ => x.len(),
    }
}

/// C3: slope of y ~ 1 + x
fn fit_scale(x: &Array1<f64>, y: &Array1<f64>) -> Result<([f64; 2], [f64; 2], FitStatistics)> {
    let design = Array2::from_shape_fn((x.len(), 2), |(i, j)| if j == 0 { 1.0 } else { x[i] });
    let result = LinearRegression::new().fit(&design, y)?;

    Ok((
        [result.coefficients[1], 0.0],
        [result.standard_errors[1], 0.0],
        result.statistics,
    ))
}

/// a·x^b and its gradient; x^b·ln x is taken as 0 at x = 0
fn power_law_with_gradient(x: f64, p: &[f64; 2]) -> (f64, [f64; 2]) {
    let xb = x.powf(p[1]);
    let ln_x = if x > 0.0 { x.ln() } else { 0.0 };
    (p[0] * xb, [xb, p[0] * xb * ln_x])
}

impl ModelFamily for ParametricPowerLawFamily {
    type Model = PowerLawModel;

    fn kind(&self) -> FamilyKind {
        FamilyKind::PowerLaw
    }

    fn fit(&self, spec: &ModelSpec, train: &Panel) -> Result<PowerLawModel> {
        let kind = PowerLawKind::from_id(&spec.id).ok_or_else(|| ModelError::InvalidConfig {
            message: format!("unknown power-law model '{}'", spec.id),
        })?;
        self.fit_kind(kind, train)
    }
}

/// Fitted C1..C4
#[derive(Debug, Clone)]
pub struct PowerLawModel {
    fitted: FittedModel,
    kind: PowerLawKind,
    params: [f64; 2],
}

impl PowerLawModel {
    /// Which sub-model this is
    pub fn kind(&self) -> PowerLawKind {
        self.kind
    }

    /// Estimated (a, b); b is 0 for C3
    pub fn params(&self) -> [f64; 2] {
        self.params
    }

    /// Prediction at one CAPE×P value
    pub fn predict_value(&self, x: f64) -> f64 {
        let [a, b] = self.params;
        match self.kind {
            PowerLawKind::LogLog => (a + b * x.max(f64::MIN_POSITIVE).ln()).exp(),
            PowerLawKind::Nonlinear => a * x.max(0.0).powf(b),
            PowerLawKind::Scale => a * x,
            PowerLawKind::Linear => a * x + b,
        }
    }
}

impl Predict for PowerLawModel {
    fn fitted(&self) -> &FittedModel {
        &self.fitted
    }

    fn predict(&self, data: &Panel) -> Result<Array1<f64>> {
        let x = data.covariate(Covariate::CapeXPrecip)?;
        Ok(x.mapv(|v| self.predict_value(v)))
    }
}

/// Element-wise mean of member predictions
pub struct EnsembleModel {
    fitted: FittedModel,
    members: Vec<BoxedModel>,
}

impl std::fmt::Debug for EnsembleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleModel")
            .field("id", &self.fitted.id)
            .field("members", &self.member_ids())
            .finish()
    }
}

impl EnsembleModel {
    /// Average `members`; C4 is refused
    pub fn new(id: impl Into<String>, members: Vec<BoxedModel>) -> Result<Self> {
        if members.is_empty() {
            return Err(ModelError::EmptyInput("ensemble has no members".to_string()));
        }
        if members
            .iter()
            .any(|m| m.fitted().id == PowerLawKind::Linear.id())
        {
            return Err(ModelError::InvalidConfig {
                message: "C4 is excluded from the ensemble".to_string(),
            });
        }

        let n_obs = members
            .iter()
            .map(|m| m.fitted().statistics.n_obs)
            .max()
            .unwrap_or(0);

        Ok(Self {
            fitted: FittedModel {
                id: id.into(),
                family: FamilyKind::PowerLaw,
                covariates: vec![Covariate::CapeXPrecip],
                form: FunctionalForm::EnsembleMean,
                coefficients: Vec::new(),
                statistics: FitStatistics {
                    n_obs,
                    ..FitStatistics::default()
                },
                diagnostics: FitDiagnostics::default(),
            },
            members,
        })
    }

    /// Identifiers of the members, in order
    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.fitted().id.as_str()).collect()
    }

    /// Mean of already computed member predictions
    pub fn combine(predictions: &[&Array1<f64>]) -> Result<Array1<f64>> {
        let first = predictions
            .first()
            .ok_or_else(|| ModelError::EmptyInput("no member predictions".to_string()))?;
        let mut sum = Array1::zeros(first.len());
        for p in predictions {
            if p.len() != sum.len() {
                return Err(ModelError::LengthMismatch {
                    left: sum.len(),
                    right: p.len(),
                });
            }
            sum += *p;
        }
        Ok(sum / predictions.len() as f64)
    }
}

impl Predict for EnsembleModel {
    fn fitted(&self) -> &FittedModel {
        &self.fitted
    }

    fn predict(&self, data: &Panel) -> Result<Array1<f64>> {
        let predictions = self
            .members
            .iter()
            .map(|m| m.predict(data))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&Array1<f64>> = predictions.iter().collect();
        Self::combine(&refs)
    }
}
