//! Core traits and types for strike-rate models
//!
//! Every family produces an immutable [`FittedModel`] record when it is
//! fitted on a training panel. The record travels with the family's own
//! prediction state into the predict and score steps.

use ndarray::{Array1, s};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use sf_core::{Covariate, Matrix, Panel};

// Re-export core types
pub use coefficient::{Coefficient, coefficients_from};
pub use statistics::{FitDiagnostics, FitStatistics, FitWarning};

pub use crate::error::ModelError;

pub mod coefficient;
pub mod statistics;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Half-width multiplier of the reported 95% intervals
pub const Z_95: f64 = 1.96;

/// Model family enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FamilyKind {
    /// Ordinary least squares
    Linear,
    /// Gamma GLM with log link
    GammaGlm,
    /// Bayesian Gamma shape/rate regression
    BayesianGamma,
    /// Chen-style CAPE×P power-law and scale fits
    PowerLaw,
    /// Binned-mean lookup table over CAPE×P
    NonParametric,
}

impl FamilyKind {
    /// Prefix of model identifiers (`N5`, `G9`, `B3`, `C2`)
    pub fn id_prefix(&self) -> &'static str {
        match self {
            FamilyKind::Linear => "N",
            FamilyKind::GammaGlm => "G",
            FamilyKind::BayesianGamma => "B",
            FamilyKind::PowerLaw => "C",
            FamilyKind::NonParametric => "NP",
        }
    }

    /// Response distribution assumed by the family
    pub fn distribution(&self) -> &'static str {
        match self {
            FamilyKind::Linear => "Normal",
            FamilyKind::GammaGlm | FamilyKind::BayesianGamma => "Gamma",
            FamilyKind::PowerLaw => "Normal",
            FamilyKind::NonParametric => "None",
        }
    }

    /// Report group the family belongs to
    pub fn group_name(&self) -> &'static str {
        match self {
            FamilyKind::Linear => "Linear",
            FamilyKind::GammaGlm => "GLM",
            FamilyKind::BayesianGamma => "Bayesian",
            FamilyKind::PowerLaw | FamilyKind::NonParametric => "Chen",
        }
    }

    /// Short name used for output file stems
    pub fn file_stem(&self) -> &'static str {
        match self {
            FamilyKind::Linear => "linear",
            FamilyKind::GammaGlm => "glm",
            FamilyKind::BayesianGamma => "bayesian",
            FamilyKind::PowerLaw | FamilyKind::NonParametric => "chen",
        }
    }
}

impl fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyKind::Linear => write!(f, "Linear"),
            FamilyKind::GammaGlm => write!(f, "Gamma GLM"),
            FamilyKind::BayesianGamma => write!(f, "Bayesian Gamma"),
            FamilyKind::PowerLaw => write!(f, "Power law"),
            FamilyKind::NonParametric => write!(f, "Non-parametric"),
        }
    }
}

impl FromStr for FamilyKind {
    type Err = ModelError;

    /// Accepts the family name or its identifier prefix, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lm" | "n" => Ok(FamilyKind::Linear),
            "glm" | "gamma" | "g" => Ok(FamilyKind::GammaGlm),
            "bayes" | "bayesian" | "b" => Ok(FamilyKind::BayesianGamma),
            "chen" | "powerlaw" | "power-law" | "c" => Ok(FamilyKind::PowerLaw),
            "np" | "binned" | "nonparametric" => Ok(FamilyKind::NonParametric),
            _ => Err(ModelError::InvalidConfig {
                message: format!("unknown model family '{}'", s),
            }),
        }
    }
}

/// Functional form of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionalForm {
    /// y = a + b·x1 + c·x2 + …
    Affine,
    /// log(μ) = a + b·x1 + …
    LogLinear,
    /// α(x), β(x) affine in the covariates
    ShapeRateLinear,
    /// log α(x), log β(x) affine in the covariates
    ShapeRateLogLinear,
    /// log(y + ε) = a + b·log(x)
    LogLogPowerLaw,
    /// y = a·x^b
    PowerLaw,
    /// y = a·x
    Scale,
    /// y = a·x + b
    Linear,
    /// Mean of member predictions
    EnsembleMean,
    /// Mean response of the CAPE×P bin
    BinnedMean,
}

impl fmt::Display for FunctionalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FunctionalForm::Affine => "y = a + b*x1 + ... + g*x6",
            FunctionalForm::LogLinear => "log(mu) = a + b*x1 + ... + g*x6",
            FunctionalForm::ShapeRateLinear => "y ~ Gamma(a + b*x.., a + b*x..)",
            FunctionalForm::ShapeRateLogLinear => "y ~ Gamma(exp(a + b*x..), exp(a + b*x..))",
            FunctionalForm::LogLogPowerLaw => "log(y + eps) = a + b*log(x)",
            FunctionalForm::PowerLaw => "y = a*x^b",
            FunctionalForm::Scale => "y = a*x",
            FunctionalForm::Linear => "y = a*x + b",
            FunctionalForm::EnsembleMean => "mean(C1, C2, C3, NP)",
            FunctionalForm::BinnedMean => "y = mean(y | bin(x))",
        };
        write!(f, "{}", text)
    }
}

impl FunctionalForm {
    /// Estimation procedure behind the form
    pub fn fitting_function(&self) -> &'static str {
        match self {
            FunctionalForm::Affine => "ols",
            FunctionalForm::LogLinear => "glm_irls",
            FunctionalForm::ShapeRateLinear | FunctionalForm::ShapeRateLogLinear => "hmc",
            FunctionalForm::LogLogPowerLaw => "ols_log_log",
            FunctionalForm::PowerLaw | FunctionalForm::Linear => "nls",
            FunctionalForm::Scale => "ols_slope",
            FunctionalForm::EnsembleMean => "ensemble_mean",
            FunctionalForm::BinnedMean => "binned_mean",
        }
    }
}

/// Identifier and covariate subset of one scheduled model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier, e.g. `G9`
    pub id: String,
    /// Ordered covariate subset
    pub covariates: Vec<Covariate>,
}

impl ModelSpec {
    /// Create a spec
    pub fn new(id: impl Into<String>, covariates: Vec<Covariate>) -> Self {
        Self {
            id: id.into(),
            covariates,
        }
    }

    /// Report label of the covariate subset
    pub fn predictors(&self) -> String {
        Covariate::subset_label(&self.covariates)
    }
}

/// Immutable record of one fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    /// Model identifier
    pub id: String,
    /// Family the model belongs to
    pub family: FamilyKind,
    /// Ordered covariate subset
    pub covariates: Vec<Covariate>,
    /// Functional form tag
    pub form: FunctionalForm,
    /// Estimated parameters with 95% half-widths
    pub coefficients: Vec<Coefficient>,
    /// Fit statistics
    pub statistics: FitStatistics,
    /// Convergence diagnostics
    pub diagnostics: FitDiagnostics,
}

impl FittedModel {
    /// Report label of the covariate subset
    pub fn predictors(&self) -> String {
        Covariate::subset_label(&self.covariates)
    }
}

/// A family fitted once per covariate subset of a schedule
pub trait ModelFamily: Send + Sync {
    /// Fitted state used for prediction
    type Model: Predict + Send + Sync;

    /// Which family this is
    fn kind(&self) -> FamilyKind;

    /// Fit on a (standardized) training panel
    fn fit(&self, spec: &ModelSpec, train: &Panel) -> Result<Self::Model>;
}

/// Prediction from a fitted model
pub trait Predict {
    /// The immutable fit record
    fn fitted(&self) -> &FittedModel;

    /// Predict strike rates for every row of `data`
    fn predict(&self, data: &Panel) -> Result<Array1<f64>>;

    /// Predict, also returning prediction-time warnings (fallbacks, clamping)
    fn predict_with_warnings(&self, data: &Panel) -> Result<(Array1<f64>, Vec<FitWarning>)> {
        Ok((self.predict(data)?, Vec::new()))
    }
}

/// Type-erased fitted model
pub type BoxedModel = Box<dyn Predict + Send + Sync>;

/// Covariate matrix with a leading intercept column
pub fn design_matrix(panel: &Panel, covariates: &[Covariate]) -> Result<Matrix> {
    let x = panel.covariate_matrix(covariates)?;
    Ok(with_intercept(&x))
}

/// Prepend a column of ones
pub fn with_intercept(x: &Matrix) -> Matrix {
    let mut out = Matrix::ones((x.nrows(), x.ncols() + 1));
    out.slice_mut(s![.., 1..]).assign(x);
    out
}

/// Coefficient names for an intercept plus covariate subset
pub fn coefficient_names(covariates: &[Covariate]) -> Vec<String> {
    std::iter::once("(Intercept)".to_string())
        .chain(covariates.iter().map(|c| c.label().to_string()))
        .collect()
}
