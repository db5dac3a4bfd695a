//! Strike-rate model families and their held-out evaluation
//!
//! Five families are fitted on the training partition of a panel and scored
//! on the test partition with the same metric suite:
//!
//! - [`lm`]: ordinary least squares, N1..N13
//! - [`glm`]: Gamma GLM with log link fitted by IRLS, G1..G13
//! - [`bayes`]: Bayesian Gamma shape/rate regression sampled by HMC, B1..B5
//! - [`powerlaw`]: Chen-style CAPE×P power-law and scale fits, C1..C5
//! - [`binned`]: binned-mean lookup over CAPE×P, NP
//!
//! [`evaluator::Evaluator`] drives the families over their schedules and
//! [`export::ResultExporter`] writes the resulting tables.

pub mod base;
pub mod bayes;
pub mod binned;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod glm;
pub mod linalg;
pub mod lm;
pub mod metrics;
pub mod powerlaw;
pub mod report;
pub mod schedule;

pub use base::{
    BoxedModel, Coefficient, FamilyKind, FitDiagnostics, FitStatistics, FitWarning, FittedModel,
    FunctionalForm, ModelFamily, ModelSpec, Predict, Result,
};
pub use bayes::{BayesianGammaFamily, HmcSampler, PosteriorSampler, SamplerConfig};
pub use binned::NonParametricBinFamily;
pub use error::ModelError;
pub use evaluator::{EvaluationReport, Evaluator, FamilyReport, FitFailure, PipelineConfig};
pub use export::ResultExporter;
pub use glm::GammaGlmFamily;
pub use lm::LinearFamily;
pub use metrics::{SkillScorer, SkillScores};
pub use powerlaw::{EnsembleModel, ParametricPowerLawFamily};
pub use report::{ParameterRow, PerformanceRecord, PredictionTable};
