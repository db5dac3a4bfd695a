//! Posterior sampling
//!
//! [`PosteriorSampler`] is the seam between the Bayesian family and the
//! sampling backend. [`HmcSampler`] is the built-in backend: static-length
//! Hamiltonian Monte Carlo with a jittered number of leapfrog steps, step
//! size tuned by dual averaging and a diagonal metric estimated during
//! warmup. Chains run in parallel and share nothing until they finish.

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::diagnostics::{effective_sample_size, split_r_hat};
use super::model::LogDensity;
use crate::base::{ModelError, Result};

/// Energy error above which a transition counts as divergent
const MAX_ENERGY_ERROR: f64 = 1000.0;

/// Sampler settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of independent chains. Default: 4
    pub chains: usize,
    /// Adaptation iterations per chain, discarded. Default: 1000
    pub warmup: usize,
    /// Retained draws per chain. Default: 1000
    pub draws: usize,
    /// Base seed; chain k uses `seed + k`. Default: 123
    pub seed: u64,
    /// Upper bound of the jittered leapfrog count. Default: 32
    pub max_leapfrog: usize,
    /// Target acceptance probability of step-size adaptation. Default: 0.8
    pub target_accept: f64,
    /// Split R-hat above this flags poor mixing. Default: 1.05
    pub max_r_hat: f64,
    /// Effective sample size below this flags poor mixing. Default: 100
    pub min_ess: f64,
    /// Draws used for the pointwise log-likelihood. Default: 1000
    pub log_likelihood_draws: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            warmup: 1000,
            draws: 1000,
            seed: 123,
            max_leapfrog: 32,
            target_accept: 0.8,
            max_r_hat: 1.05,
            min_ess: 100.0,
            log_likelihood_draws: 1000,
        }
    }
}

impl SamplerConfig {
    /// Check the settings before sampling
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(ModelError::InvalidConfig {
                message: message.to_string(),
            })
        };
        if self.chains == 0 {
            return invalid("at least one chain is required");
        }
        if self.draws < 4 {
            return invalid("at least four draws per chain are required");
        }
        if self.max_leapfrog == 0 {
            return invalid("max_leapfrog must be positive");
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return invalid("target_accept must lie in (0, 1)");
        }
        Ok(())
    }
}

/// Draws of one chain after warmup
#[derive(Debug, Clone)]
pub struct ChainDraws {
    /// draws × parameters
    pub draws: Array2<f64>,
    /// Mean acceptance probability after warmup
    pub accept_rate: f64,
    /// Divergent transitions after warmup
    pub divergences: usize,
    /// Adapted step size
    pub step_size: f64,
}

/// Posterior summary of one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Parameter name
    pub name: String,
    /// Posterior mean
    pub mean: f64,
    /// Posterior standard deviation
    pub sd: f64,
    /// Split R-hat
    pub r_hat: f64,
    /// Effective sample size
    pub ess: f64,
}

/// Draws of every chain
#[derive(Debug, Clone)]
pub struct PosteriorDraws {
    /// Parameter names, in column order
    pub names: Vec<String>,
    /// Per-chain draws
    pub chains: Vec<ChainDraws>,
}

impl PosteriorDraws {
    /// Number of parameters
    pub fn dim(&self) -> usize {
        self.names.len()
    }

    /// Retained draws across all chains
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.nrows()).sum()
    }

    /// Per-chain draws of parameter `j`
    pub fn parameter_chains(&self, j: usize) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|c| c.draws.column(j).to_vec())
            .collect()
    }

    /// Posterior mean of every parameter
    pub fn mean(&self) -> Vec<f64> {
        let total = self.total_draws().max(1) as f64;
        (0..self.dim())
            .map(|j| {
                self.chains
                    .iter()
                    .map(|c| c.draws.column(j).sum())
                    .sum::<f64>()
                    / total
            })
            .collect()
    }

    /// Mean, sd, R-hat and ESS of every parameter
    pub fn summary(&self) -> Vec<ParameterSummary> {
        let means = self.mean();
        let total = self.total_draws();

        self.names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let chains = self.parameter_chains(j);
                let ss: f64 = chains
                    .iter()
                    .flatten()
                    .map(|x| (x - means[j]).powi(2))
                    .sum();
                let sd = if total > 1 {
                    (ss / (total - 1) as f64).sqrt()
                } else {
                    0.0
                };

                ParameterSummary {
                    name: name.clone(),
                    mean: means[j],
                    sd,
                    r_hat: split_r_hat(&chains),
                    ess: effective_sample_size(&chains),
                }
            })
            .collect()
    }

    /// Divergent transitions summed over chains
    pub fn divergences(&self) -> usize {
        self.chains.iter().map(|c| c.divergences).sum()
    }

    /// Mean acceptance rate over chains
    pub fn accept_rate(&self) -> f64 {
        if self.chains.is_empty() {
            return 0.0;
        }
        self.chains.iter().map(|c| c.accept_rate).sum::<f64>() / self.chains.len() as f64
    }

    /// At most `max` draws spread evenly over all chains
    pub fn thinned(&self, max: usize) -> Vec<Vec<f64>> {
        let all: Vec<Vec<f64>> = self
            .chains
            .iter()
            .flat_map(|c| c.draws.rows().into_iter().map(|r| r.to_vec()))
            .collect();
        if max == 0 || all.len() <= max {
            return all;
        }
        let step = all.len() as f64 / max as f64;
        (0..max)
            .map(|i| all[(i as f64 * step) as usize].clone())
            .collect()
    }
}

/// Backend that draws from a posterior
pub trait PosteriorSampler: Send + Sync {
    /// Sample `target`
    fn sample(&self, target: &dyn LogDensity) -> Result<PosteriorDraws>;

    /// Settings in use
    fn config(&self) -> &SamplerConfig;
}

/// Hamiltonian Monte Carlo backend
#[derive(Debug, Clone, Copy, Default)]
pub struct HmcSampler {
    config: SamplerConfig,
}

impl HmcSampler {
    /// Create a sampler
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }
}

impl PosteriorSampler for HmcSampler {
    fn sample(&self, target: &dyn LogDensity) -> Result<PosteriorDraws> {
        self.config.validate()?;

        let chains = (0..self.config.chains)
            .into_par_iter()
            .map(|k| self.run_chain(target, k))
            .collect::<Result<Vec<_>>>()?;

        Ok(PosteriorDraws {
            names: target.parameter_names(),
            chains,
        })
    }

    fn config(&self) -> &SamplerConfig {
        &self.config
    }
}

/// Position, gradient and log density at one point
#[derive(Debug, Clone)]
struct State {
    theta: Vec<f64>,
    grad: Vec<f64>,
    log_density: f64,
}

impl State {
    fn at(target: &dyn LogDensity, theta: Vec<f64>) -> Self {
        let mut grad = vec![0.0; theta.len()];
        let log_density = target.log_density_and_gradient(&theta, &mut grad);
        Self {
            theta,
            grad,
            log_density,
        }
    }
}

/// Dual-averaging step-size adaptation (Hoffman & Gelman, 2014)
#[derive(Debug, Clone)]
struct DualAveraging {
    mu: f64,
    target: f64,
    h_bar: f64,
    log_step: f64,
    log_step_bar: f64,
    counter: f64,
}

impl DualAveraging {
    const GAMMA: f64 = 0.05;
    const T0: f64 = 10.0;
    const KAPPA: f64 = 0.75;

    fn new(step_size: f64, target: f64) -> Self {
        Self {
            mu: (10.0 * step_size).ln(),
            target,
            h_bar: 0.0,
            log_step: step_size.ln(),
            log_step_bar: 0.0,
            counter: 0.0,
        }
    }

    fn update(&mut self, accept_prob: f64) -> f64 {
        self.counter += 1.0;
        let m = self.counter;
        let w = 1.0 / (m + Self::T0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.target - accept_prob);
        self.log_step = self.mu - m.sqrt() / Self::GAMMA * self.h_bar;
        let eta = m.powf(-Self::KAPPA);
        self.log_step_bar = eta * self.log_step + (1.0 - eta) * self.log_step_bar;
        self.log_step.exp()
    }

    fn final_step(&self) -> f64 {
        self.log_step_bar.exp()
    }
}

/// Welford accumulator of per-coordinate variances
#[derive(Debug, Clone)]
struct VarianceEstimator {
    n: f64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl VarianceEstimator {
    fn new(dim: usize) -> Self {
        Self {
            n: 0.0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    fn add(&mut self, x: &[f64]) {
        self.n += 1.0;
        for ((mean, m2), &xi) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(x) {
            let delta = xi - *mean;
            *mean += delta / self.n;
            *m2 += delta * (xi - *mean);
        }
    }

    /// Variance shrunk towards 1e-3 as in Stan's diagonal adaptation
    fn regularized(&self) -> Option<Vec<f64>> {
        if self.n < 3.0 {
            return None;
        }
        let n = self.n;
        Some(
            self.m2
                .iter()
                .map(|m2| (n / (n + 5.0)) * m2 / (n - 1.0) + 1e-3 * (5.0 / (n + 5.0)))
                .collect(),
        )
    }
}

impl HmcSampler {
    fn run_chain(&self, target: &dyn LogDensity, chain: usize) -> Result<ChainDraws> {
        let cfg = &self.config;
        let dim = target.dim();
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed.wrapping_add(chain as u64));

        let mut state = self.initial_state(target, &mut rng)?;
        let mut inv_metric = vec![1.0; dim];
        let mut step_size = find_step_size(target, &state, &inv_metric, &mut rng);
        let mut adapter = DualAveraging::new(step_size, cfg.target_accept);

        // Metric window: 15%–75% of warmup
        let window_start = cfg.warmup * 15 / 100;
        let window_end = cfg.warmup * 75 / 100;
        let mut variance = VarianceEstimator::new(dim);

        let mut draws = Array2::zeros((cfg.draws, dim));
        let mut accept_sum = 0.0;
        let mut divergences = 0;

        for iter in 0..cfg.warmup + cfg.draws {
            let n_leapfrog = rng.random_range(1..=cfg.max_leapfrog);
            let (next, accept_prob, divergent) =
                transition(target, &state, &inv_metric, step_size, n_leapfrog, &mut rng);
            state = next;

            if iter < cfg.warmup {
                step_size = adapter.update(accept_prob);

                if iter >= window_start && iter < window_end {
                    variance.add(&state.theta);
                }
                if iter + 1 == window_end {
                    if let Some(v) = variance.regularized() {
                        inv_metric = v;
                        step_size = find_step_size(target, &state, &inv_metric, &mut rng);
                        adapter = DualAveraging::new(step_size, cfg.target_accept);
                    }
                }
                if iter + 1 == cfg.warmup {
                    step_size = adapter.final_step();
                }
            } else {
                let row = iter - cfg.warmup;
                for (j, &t) in state.theta.iter().enumerate() {
                    draws[[row, j]] = t;
                }
                accept_sum += accept_prob;
                if divergent {
                    divergences += 1;
                }
            }
        }

        debug!(
            chain,
            step_size,
            divergences,
            accept_rate = accept_sum / cfg.draws as f64,
            "Chain finished"
        );

        Ok(ChainDraws {
            draws,
            accept_rate: accept_sum / cfg.draws as f64,
            divergences,
            step_size,
        })
    }

    /// Jittered start inside the support, else the target's own start
    fn initial_state(&self, target: &dyn LogDensity, rng: &mut ChaCha8Rng) -> Result<State> {
        let base = target.initial_point();

        for _ in 0..100 {
            let theta: Vec<f64> = base
                .iter()
                .map(|&t| t + 0.1 * rng.sample::<f64, _>(StandardNormal))
                .collect();
            let state = State::at(target, theta);
            if state.log_density.is_finite() {
                return Ok(state);
            }
        }

        let state = State::at(target, base);
        if state.log_density.is_finite() {
            Ok(state)
        } else {
            Err(ModelError::Sampler(
                "initial point lies outside the posterior support".to_string(),
            ))
        }
    }
}

fn kinetic_energy(momentum: &[f64], inv_metric: &[f64]) -> f64 {
    0.5 * momentum
        .iter()
        .zip(inv_metric)
        .map(|(p, m)| p * p * m)
        .sum::<f64>()
}

fn draw_momentum(inv_metric: &[f64], rng: &mut ChaCha8Rng) -> Vec<f64> {
    inv_metric
        .iter()
        .map(|m| rng.sample::<f64, _>(StandardNormal) / m.sqrt())
        .collect()
}

/// Integrate `n_steps` leapfrog steps; `None` once the density leaves its support
fn leapfrog(
    target: &dyn LogDensity,
    start: &State,
    momentum: &mut [f64],
    inv_metric: &[f64],
    step_size: f64,
    n_steps: usize,
) -> Option<State> {
    let mut theta = start.theta.clone();
    let mut grad = start.grad.clone();
    let mut log_density = start.log_density;

    for _ in 0..n_steps {
        for (p, g) in momentum.iter_mut().zip(&grad) {
            *p += 0.5 * step_size * g;
        }
        for ((t, p), m) in theta.iter_mut().zip(momentum.iter()).zip(inv_metric) {
            *t += step_size * m * p;
        }
        log_density = target.log_density_and_gradient(&theta, &mut grad);
        if !log_density.is_finite() {
            return None;
        }
        for (p, g) in momentum.iter_mut().zip(&grad) {
            *p += 0.5 * step_size * g;
        }
    }

    Some(State {
        theta,
        grad,
        log_density,
    })
}

/// One HMC transition: (next state, acceptance probability, divergent)
fn transition(
    target: &dyn LogDensity,
    state: &State,
    inv_metric: &[f64],
    step_size: f64,
    n_leapfrog: usize,
    rng: &mut ChaCha8Rng,
) -> (State, f64, bool) {
    let mut momentum = draw_momentum(inv_metric, rng);
    let h0 = -state.log_density + kinetic_energy(&momentum, inv_metric);

    let Some(proposal) = leapfrog(target, state, &mut momentum, inv_metric, step_size, n_leapfrog)
    else {
        return (state.clone(), 0.0, true);
    };

    let h1 = -proposal.log_density + kinetic_energy(&momentum, inv_metric);
    let energy_error = h1 - h0;
    if !energy_error.is_finite() || energy_error > MAX_ENERGY_ERROR {
        return (state.clone(), 0.0, true);
    }

    let accept_prob = (-energy_error).exp().min(1.0);
    if rng.random::<f64>() < accept_prob {
        (proposal, accept_prob, false)
    } else {
        (state.clone(), accept_prob, false)
    }
}

/// Double or halve a unit step until one leapfrog step accepts about half the time
fn find_step_size(
    target: &dyn LogDensity,
    state: &State,
    inv_metric: &[f64],
    rng: &mut ChaCha8Rng,
) -> f64 {
    let mut step_size: f64 = 1.0;

    let accept_prob = |step: f64, rng: &mut ChaCha8Rng| -> f64 {
        let mut momentum = draw_momentum(inv_metric, rng);
        let h0 = -state.log_density + kinetic_energy(&momentum, inv_metric);
        match leapfrog(target, state, &mut momentum, inv_metric, step, 1) {
            Some(next) => {
                let h1 = -next.log_density + kinetic_energy(&momentum, inv_metric);
                let p = (h0 - h1).exp();
                if p.is_finite() { p } else { 0.0 }
            }
            None => 0.0,
        }
    };

    let direction = if accept_prob(step_size, rng) > 0.5 { 1.0 } else { -1.0 };
    for _ in 0..50 {
        let p = accept_prob(step_size, rng);
        if direction > 0.0 && p <= 0.5 || direction < 0.0 && p >= 0.5 {
            break;
        }
        step_size *= 2f64.powf(direction);
    }
    step_size
}
