//! Bayesian Gamma shape/rate regression
//!
//! strikes ~ Gamma(α(x), β(x)), with α and β driven by the same covariate
//! subset. Small tiers use α, β affine in x, constrained positive at every
//! training point; larger tiers use log α, log β affine in x. The two are
//! different models and each tier keeps its own.
//!
//! The point prediction is the Gamma mean α/β at the posterior-mean
//! coefficients. Lack of convergence is reported through
//! [`FitWarning::PoorMixing`], never silently.

pub mod diagnostics;
pub mod model;
pub mod sampler;


pub use model::{GammaRegressionPosterior, LogDensity, gamma_log_pdf, shape_rate};
pub use sampler::{
    ChainDraws, HmcSampler, ParameterSummary, PosteriorDraws, PosteriorSampler, SamplerConfig,
};

use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::base::{
    Coefficient, FamilyKind, FitDiagnostics, FitStatistics, FitWarning, FittedModel,
    FunctionalForm, ModelError, ModelFamily, ModelSpec, Predict, Result, coefficient_names,
    design_matrix,
};
use crate::schedule::{BayesTier, Parameterization, bayes_tiers};
use sf_core::Panel;

/// Bayesian Gamma regression over the B1..B5 tiers
#[derive(Debug, Clone)]
pub struct BayesianGammaFamily<S = HmcSampler> {
    sampler: S,
    tiers: Vec<BayesTier>,
}

impl Default for BayesianGammaFamily<HmcSampler> {
    fn default() -> Self {
        Self::new(HmcSampler::default())
    }
}

impl<S: PosteriorSampler> BayesianGammaFamily<S> {
    /// Family over the standard tiers, sampling with `sampler`
    pub fn new(sampler: S) -> Self {
        Self {
            sampler,
            tiers: bayes_tiers(),
        }
    }

    /// The tiers this family knows about
    pub fn tiers(&self) -> &[BayesTier] {
        &self.tiers
    }

    fn tier_for(&self, spec: &ModelSpec) -> Result<&BayesTier> {
        self.tiers
            .iter()
            .find(|tier| tier.spec.covariates == spec.covariates)
            .ok_or_else(|| ModelError::InvalidConfig {
                message: format!("no Bayesian tier for predictors {}", spec.predictors()),
            })
    }

    /// Fit one tier
    pub fn fit_tier(&self, tier: &BayesTier, spec: &ModelSpec, train: &Panel) -> Result<BayesianGammaModel> {
        let x = design_matrix(train, &spec.covariates)?;
        let y = train.strikes()?.clone();
        let names = coefficient_names(&spec.covariates);
        let n = y.len();

        let posterior =
            GammaRegressionPosterior::new(x, y, tier.parameterization, tier.prior_sd, &names)?;
        let draws = self.sampler.sample(&posterior)?;
        let summary = draws.summary();

        // Convergence checks
        let cfg = self.sampler.config();
        let mut diagnostics = FitDiagnostics::default();
        for param in &summary {
            if !(param.r_hat <= cfg.max_r_hat) || !(param.ess >= cfg.min_ess) {
                warn!(
                    model = %spec.id,
                    parameter = %param.name,
                    r_hat = param.r_hat,
                    ess = param.ess,
                    "Posterior sampling did not converge"
                );
                diagnostics.push(FitWarning::PoorMixing {
                    parameter: param.name.clone(),
                    r_hat: param.r_hat,
                    ess: param.ess,
                });
            }
        }
        let divergences = draws.divergences();
        if divergences > 0 {
            warn!(model = %spec.id, divergences, "Divergent transitions after warmup");
            diagnostics.push(FitWarning::Divergences { count: divergences });
        }

        // Pointwise log-likelihood over (thinned) draws
        let thinned = draws.thinned(cfg.log_likelihood_draws);
        let mut log_lik = Array2::zeros((thinned.len(), n));
        for (mut row, theta) in log_lik.rows_mut().into_iter().zip(&thinned) {
            row.assign(&posterior.pointwise_log_likelihood(theta));
        }
        let (pointwise, waic) = waic(&log_lik);

        let coefficients: Vec<Coefficient> = summary
            .iter()
            .map(|param| {
                let coef = Coefficient::new(param.name.clone(), param.mean).with_std_error(param.sd);
                if param.name.ends_with("(Intercept)") {
                    coef.as_intercept()
                } else {
                    coef
                }
            })
            .collect();
        let theta: Vec<f64> = summary.iter().map(|p| p.mean).collect();

        info!(
            model = %spec.id,
            accept_rate = draws.accept_rate(),
            divergences,
            waic = ?waic,
            "Sampled Bayesian Gamma model"
        );

        let form = match tier.parameterization {
            Parameterization::Linear => FunctionalForm::ShapeRateLinear,
            Parameterization::LogLinear => FunctionalForm::ShapeRateLogLinear,
        };

        Ok(BayesianGammaModel {
            fitted: FittedModel {
                id: spec.id.clone(),
                family: FamilyKind::BayesianGamma,
                covariates: spec.covariates.clone(),
                form,
                coefficients,
                statistics: FitStatistics {
                    n_obs: n,
                    log_likelihood: Some(pointwise.sum()).filter(|v| v.is_finite()),
                    waic,
                    ..FitStatistics::default()
                },
                diagnostics,
            },
            parameterization: tier.parameterization,
            theta,
            summary,
            pointwise_log_likelihood: pointwise,
            accept_rate: draws.accept_rate(),
            divergences,
        })
    }
}

impl<S: PosteriorSampler> ModelFamily for BayesianGammaFamily<S> {
    type Model = BayesianGammaModel;

    fn kind(&self) -> FamilyKind {
        FamilyKind::BayesianGamma
    }

    fn fit(&self, spec: &ModelSpec, train: &Panel) -> Result<BayesianGammaModel> {
        let tier = self.tier_for(spec)?;
        self.fit_tier(tier, spec, train)
    }
}

/// Per-observation mean log-likelihood and WAIC from a draws × n matrix
pub fn waic(log_lik: &Array2<f64>) -> (Array1<f64>, Option<f64>) {
    let s = log_lik.nrows();
    if s == 0 {
        return (Array1::zeros(log_lik.ncols()), None);
    }

    let mut pointwise = Array1::zeros(log_lik.ncols());
    let mut elpd = 0.0;
    for (i, column) in log_lik.columns().into_iter().enumerate() {
        let max = column.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let lppd = max + (column.mapv(|v| (v - max).exp()).sum() / s as f64).ln();
        let mean = column.sum() / s as f64;
        let p_waic = if s > 1 {
            column.mapv(|v| (v - mean).powi(2)).sum() / (s - 1) as f64
        } else {
            0.0
        };
        pointwise[i] = mean;
        elpd += lppd - p_waic;
    }

    let waic = -2.0 * elpd;
    (pointwise, waic.is_finite().then_some(waic))
}

/// Fitted Bayesian Gamma model at its posterior-mean coefficients
#[derive(Debug, Clone)]
pub struct BayesianGammaModel {
    fitted: FittedModel,
    parameterization: Parameterization,
    theta: Vec<f64>,
    summary: Vec<ParameterSummary>,
    pointwise_log_likelihood: Array1<f64>,
    accept_rate: f64,
    divergences: usize,
}

impl BayesianGammaModel {
    /// Posterior summaries with R-hat and ESS
    pub fn summary(&self) -> &[ParameterSummary] {
        &self.summary
    }

    /// Training log-likelihood per observation, averaged over draws
    pub fn pointwise_log_likelihood(&self) -> &Array1<f64> {
        &self.pointwise_log_likelihood
    }

    /// Mean acceptance rate after warmup
    pub fn accept_rate(&self) -> f64 {
        self.accept_rate
    }

    /// Divergent transitions after warmup
    pub fn divergences(&self) -> usize {
        self.divergences
    }

    /// Posterior-mean coefficients, shape block then rate block
    pub fn theta(&self) -> &[f64] {
        &self.theta
    }
}

impl Predict for BayesianGammaModel {
    fn fitted(&self) -> &FittedModel {
        &self.fitted
    }

    fn predict(&self, data: &Panel) -> Result<Array1<f64>> {
        self.predict_with_warnings(data).map(|(pred, _)| pred)
    }

    fn predict_with_warnings(&self, data: &Panel) -> Result<(Array1<f64>, Vec<FitWarning>)> {
        let x = design_matrix(data, &self.fitted.covariates)?;
        let mut clamped = 0;

        let predictions = Array1::from_iter(x.rows().into_iter().map(|row| {
            let (alpha, beta) = shape_rate(self.parameterization, &self.theta, row);
            if alpha > 0.0 && beta > 0.0 {
                alpha / beta
            } else {
                clamped += 1;
                alpha.max(f64::EPSILON) / beta.max(f64::EPSILON)
            }
        }));

        let mut warnings = Vec::new();
        if clamped > 0 {
            debug!(model = %self.fitted.id, clamped, "Shape or rate outside support at prediction");
            warnings.push(FitWarning::ClampedSupport { count: clamped });
        }
        Ok((predictions, warnings))
    }
}
