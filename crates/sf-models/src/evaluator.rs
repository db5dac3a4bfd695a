//! Pipeline driver
//!
//! Splits the panel once, then runs every selected family over its schedule.
//! Linear, GLM and Bayesian fits standardize their own covariate subset with
//! train-only statistics; the Chen suite works on raw CAPE×P. Fits within a
//! schedule are independent and run on the rayon pool, and a failing fit
//! only removes its own row.

use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::base::{
    BoxedModel, FamilyKind, FittedModel, ModelError, ModelFamily, ModelSpec, Predict, Result,
};
use crate::bayes::{BayesianGammaFamily, HmcSampler, SamplerConfig};
use crate::binned::{BINNED_ID, DEFAULT_BIN_COUNT, NonParametricBinFamily, binned_spec};
use crate::glm::GammaGlmFamily;
use crate::glm::irls::IrlsConfig;
use crate::lm::LinearFamily;
use crate::metrics::{BIN_MODEL_SSCORE_BINS, DEFAULT_SSCORE_BINS, SkillScorer, SkillScores};
use crate::powerlaw::nls::NlsConfig;
use crate::powerlaw::{
    DEFAULT_LOG_EPSILON, ENSEMBLE_ID, EnsembleModel, ParametricPowerLawFamily, PowerLawConfig,
    PowerLawKind, power_law_schedule,
};
use crate::report::{ParameterRow, PerformanceRecord, PredictionTable};
use crate::schedule::{glm_schedule, linear_schedule};
use sf_core::{Covariate, DatasetSplitter, Panel, Partition, Standardizer};

/// Settings of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed of the train/test split. Default: 123
    pub seed: u64,
    /// Fraction of rows used for training. Default: 0.8
    pub train_fraction: f64,
    /// S-score bins for the Linear, GLM and Bayesian families. Default: 15
    pub sscore_bins: usize,
    /// S-score bins for the Chen family. Default: 50
    pub bin_model_sscore_bins: usize,
    /// Bins of the non-parametric model. Default: 50
    pub bin_count: usize,
    /// ε in the C1 log-log fit. Default: 1e-4
    pub log_epsilon: f64,
    /// Families to run, in order
    pub families: Vec<FamilyKind>,
    pub irls: IrlsConfig,
    pub nls: NlsConfig,
    pub sampler: SamplerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: sf_core::data::DEFAULT_SEED,
            train_fraction: sf_core::data::DEFAULT_TRAIN_FRACTION,
            sscore_bins: DEFAULT_SSCORE_BINS,
            bin_model_sscore_bins: BIN_MODEL_SSCORE_BINS,
            bin_count: DEFAULT_BIN_COUNT,
            log_epsilon: DEFAULT_LOG_EPSILON,
            families: vec![
                FamilyKind::Linear,
                FamilyKind::GammaGlm,
                FamilyKind::BayesianGamma,
                FamilyKind::PowerLaw,
            ],
            irls: IrlsConfig::default(),
            nls: NlsConfig::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings no run could use
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(ModelError::InvalidConfig { message });

        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return invalid(format!("train_fraction must lie in (0, 1), got {}", self.train_fraction));
        }
        if self.sscore_bins == 0 || self.bin_model_sscore_bins == 0 {
            return invalid("S-score bin counts must be positive".to_string());
        }
        if self.bin_count == 0 {
            return invalid("bin_count must be positive".to_string());
        }
        if !(self.log_epsilon.is_finite() && self.log_epsilon >= 0.0) {
            return invalid(format!("log_epsilon must be finite and >= 0, got {}", self.log_epsilon));
        }
        if self.families.is_empty() {
            return invalid("no model family selected".to_string());
        }
        if self.families.contains(&FamilyKind::BayesianGamma) {
            self.sampler.validate()?;
        }
        Ok(())
    }

    fn runs(&self, family: FamilyKind) -> bool {
        self.families.contains(&family)
    }
}

/// A model that failed to fit, predict or score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFailure {
    pub model: String,
    pub predictors: String,
    pub message: String,
}

/// Tables and fitted records of one family
#[derive(Debug, Clone)]
pub struct FamilyReport {
    /// Family the tables belong to
    pub family: FamilyKind,
    pub predictions: PredictionTable,
    pub performance: Vec<PerformanceRecord>,
    pub parameters: Vec<ParameterRow>,
    /// Fit records of every model that produced predictions, in schedule order
    pub models: Vec<FittedModel>,
    pub failures: Vec<FitFailure>,
}

impl FamilyReport {
    /// Stem of the exported files
    pub fn file_stem(&self) -> &'static str {
        self.family.file_stem()
    }

    /// Fit record of one model
    pub fn model(&self, id: &str) -> Option<&FittedModel> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Performance record of one model
    pub fn record(&self, id: &str) -> Option<&PerformanceRecord> {
        self.performance.iter().find(|r| r.model_name == id)
    }
}

/// Output of a full run
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    /// Train/test membership
    pub partition: Partition,
    /// One report per family, in run order
    pub families: Vec<FamilyReport>,
}

impl EvaluationReport {
    /// Report of one family
    pub fn family(&self, kind: FamilyKind) -> Option<&FamilyReport> {
        self.families.iter().find(|f| f.family == kind)
    }
}

/// Members of the C5 ensemble
const ENSEMBLE_MEMBERS: [&str; 4] = ["C1", "C2", "C3", BINNED_ID];

/// Predictions and held-out scores of one model
#[derive(Debug, Clone)]
struct ScoredModel {
    fitted: FittedModel,
    predictions: Array1<f64>,
    scores: SkillScores,
}

type Outcome = (ModelSpec, Result<ScoredModel>);

/// Predict the test panel, fold prediction warnings into the record and score
fn score_model(model: &dyn Predict, test: &Panel, observed: &Array1<f64>, scorer: &SkillScorer) -> Result<ScoredModel> {
    let (predictions, warnings) = model.predict_with_warnings(test)?;
    let scores = scorer.score(observed.view(), predictions.view())?;

    let mut fitted = model.fitted().clone();
    for warning in warnings {
        fitted.diagnostics.push(warning);
    }

    Ok(ScoredModel {
        fitted,
        predictions,
        scores,
    })
}

/// Runs the families of a [`PipelineConfig`] over a panel
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: PipelineConfig,
}

impl Evaluator {
    /// Create an evaluator
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split, fit, predict and score every selected family
    pub fn run(&self, panel: &Panel) -> Result<EvaluationReport> {
        self.config.validate()?;

        let splitter = DatasetSplitter::new(self.config.seed).train_fraction(self.config.train_fraction);
        let (train, test, partition) = splitter.split(panel)?;
        info!(
            n_rows = panel.nrows(),
            n_train = train.nrows(),
            n_test = test.nrows(),
            seed = self.config.seed,
            "Split panel"
        );

        let mut families = Vec::new();
        for &kind in &self.config.families {
            let report = match kind {
                FamilyKind::Linear => self.run_schedule(&LinearFamily::new(), &linear_schedule(), &train, &test)?,
                FamilyKind::GammaGlm => {
                    self.run_schedule(&GammaGlmFamily::new(self.config.irls), &glm_schedule(), &train, &test)?
                }
                FamilyKind::BayesianGamma => {
                    let family = BayesianGammaFamily::new(HmcSampler::new(self.config.sampler));
                    let schedule: Vec<ModelSpec> = family.tiers().iter().map(|t| t.spec.clone()).collect();
                    self.run_schedule(&family, &schedule, &train, &test)?
                }
                FamilyKind::PowerLaw => self.run_chen(&train, &test, true)?,
                FamilyKind::NonParametric => {
                    // Already part of the power-law run
                    if self.config.runs(FamilyKind::PowerLaw) {
                        continue;
                    }
                    self.run_chen(&train, &test, false)?
                }
            };
            families.push(report);
        }

        Ok(EvaluationReport { partition, families })
    }

    /// Fit one family over a schedule on standardized covariates
    pub fn run_schedule<F: ModelFamily>(
        &self,
        family: &F,
        schedule: &[ModelSpec],
        train: &Panel,
        test: &Panel,
    ) -> Result<FamilyReport> {
        let kind = family.kind();
        let observed = test.strikes()?.clone();
        let scorer = SkillScorer::new(self.config.sscore_bins);
        info!(family = %kind, models = schedule.len(), "Fitting family");

        let outcomes: Vec<Outcome> = schedule
            .par_iter()
            .map(|spec| {
                let result = fit_standardized(family, spec, train, test)
                    .and_then(|(model, test_std)| score_model(&model, &test_std, &observed, &scorer));
                (spec.clone(), result)
            })
            .collect();

        let report = assemble(kind, observed, outcomes, |_| true)?;
        info!(
            family = %kind,
            fitted = report.models.len(),
            failed = report.failures.len(),
            "Finished family"
        );
        Ok(report)
    }

    /// C1..C5 and the binned model on raw CAPE×P
    ///
    /// With `with_power_laws` false only the binned model is fitted.
    fn run_chen(&self, train: &Panel, test: &Panel, with_power_laws: bool) -> Result<FamilyReport> {
        let kind = if with_power_laws {
            FamilyKind::PowerLaw
        } else {
            FamilyKind::NonParametric
        };
        let observed = test.strikes()?.clone();
        let scorer = SkillScorer::new(self.config.bin_model_sscore_bins);
        info!(family = %kind, "Fitting family");

        let power_laws = ParametricPowerLawFamily::new(PowerLawConfig {
            log_epsilon: self.config.log_epsilon,
            nls: self.config.nls,
        });
        let schedule = if with_power_laws {
            power_law_schedule()
        } else {
            Vec::new()
        };

        let mut fitted: Vec<(ModelSpec, Result<BoxedModel>)> = schedule
            .par_iter()
            .map(|spec| {
                let model = power_laws.fit(spec, train).map(|m| Box::new(m) as BoxedModel);
                (spec.clone(), model)
            })
            .collect();

        let np_spec = binned_spec();
        let np = NonParametricBinFamily::new(self.config.bin_count)
            .fit(&np_spec, train)
            .map(|m| Box::new(m) as BoxedModel);
        fitted.push((np_spec, np));

        let mut outcomes: Vec<Outcome> = Vec::with_capacity(fitted.len() + 1);
        let mut available: Vec<(String, BoxedModel)> = Vec::new();
        for (spec, model) in fitted {
            let scored = model.and_then(|m| {
                score_model(m.as_ref(), test, &observed, &scorer).map(|scored| (m, scored))
            });
            match scored {
                Ok((model, scored)) => {
                    if !is_reported(&spec.id) {
                        debug!(
                            model = %spec.id,
                            rmse = scored.scores.rmse,
                            cor = ?scored.scores.correlation,
                            sscore = scored.scores.s_score,
                            "Scored unreported model"
                        );
                    }
                    available.push((spec.id.clone(), model));
                    outcomes.push((spec, Ok(scored)));
                }
                Err(error) => outcomes.push((spec, Err(error))),
            }
        }

        // Columns: C1, C2, C3, C4, C5, NP
        if with_power_laws {
            let c5 = ensemble(available, test, &observed, &scorer);
            let at = outcomes.len().saturating_sub(1);
            outcomes.insert(at, (ModelSpec::new(ENSEMBLE_ID, vec![Covariate::CapeXPrecip]), c5));
        }

        let report = assemble(kind, observed, outcomes, is_reported)?;
        info!(
            family = %kind,
            fitted = report.models.len(),
            failed = report.failures.len(),
            "Finished family"
        );
        Ok(report)
    }
}

/// Whether a Chen model enters the performance and parameter tables
fn is_reported(id: &str) -> bool {
    PowerLawKind::from_id(id).map_or(true, |kind| kind.is_reported())
}

/// C5 from C1, C2, C3 and NP; fails unless all four are available
fn ensemble(
    mut available: Vec<(String, BoxedModel)>,
    test: &Panel,
    observed: &Array1<f64>,
    scorer: &SkillScorer,
) -> Result<ScoredModel> {
    let mut members = Vec::with_capacity(ENSEMBLE_MEMBERS.len());
    for id in ENSEMBLE_MEMBERS {
        let at = available
            .iter()
            .position(|(member, _)| member == id)
            .ok_or_else(|| ModelError::InvalidConfig {
                message: format!("ensemble member {} is unavailable", id),
            })?;
        members.push(available.swap_remove(at).1);
    }

    let ensemble = EnsembleModel::new(ENSEMBLE_ID, members)?;
    score_model(&ensemble, test, observed, scorer)
}

/// Standardize the spec's covariates with train statistics, fit, and return
/// the test panel in the same units
fn fit_standardized<F: ModelFamily>(
    family: &F,
    spec: &ModelSpec,
    train: &Panel,
    test: &Panel,
) -> Result<(F::Model, Panel)> {
    let stats = Standardizer::fit(train, &spec.covariates)?;
    let train_std = Standardizer::apply(&stats, train)?;
    let test_std = Standardizer::apply(&stats, test)?;
    let model = family.fit(spec, &train_std)?;
    Ok((model, test_std))
}

/// Turn ordered outcomes into the family tables
fn assemble(
    kind: FamilyKind,
    observed: Array1<f64>,
    outcomes: Vec<Outcome>,
    reported: impl Fn(&str) -> bool,
) -> Result<FamilyReport> {
    let mut predictions = PredictionTable::new(observed);
    let mut performance = Vec::new();
    let mut parameters = Vec::new();
    let mut models = Vec::new();
    let mut failures = Vec::new();

    for (spec, result) in outcomes {
        match result {
            Ok(scored) => {
                predictions.insert(spec.id.clone(), scored.predictions)?;
                if reported(&spec.id) {
                    performance.push(PerformanceRecord::new(&scored.fitted, &scored.scores));
                    parameters.extend(ParameterRow::rows(&scored.fitted));
                }
                if !scored.fitted.diagnostics.converged {
                    warn!(
                        family = %kind,
                        model = %spec.id,
                        predictors = %spec.predictors(),
                        warnings = scored.fitted.diagnostics.warnings.len(),
                        "Model kept with convergence warnings"
                    );
                }
                models.push(scored.fitted);
            }
            Err(error) => {
                warn!(
                    family = %kind,
                    model = %spec.id,
                    predictors = %spec.predictors(),
                    error = %error,
                    "Model fit failed"
                );
                failures.push(FitFailure {
                    model: spec.id.clone(),
                    predictors: spec.predictors(),
                    message: error.to_string(),
                });
            }
        }
    }

    Ok(FamilyReport {
        family: kind,
        predictions,
        performance,
        parameters,
        models,
        failures,
    })
}
