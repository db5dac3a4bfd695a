//! Covariate-subset schedules
//!
//! The linear and GLM families share one fixed 13-subset schedule. The
//! Bayesian family runs five tiers mirroring subsets 1 and 9–13.

use serde::{Deserialize, Serialize};

use sf_core::Covariate::{self, *};

use crate::base::{FamilyKind, ModelSpec};

/// The 13 near-surface covariate subsets, in model numbering order
pub const SUBSETS: [&[Covariate]; 13] = [
    &[Cape],
    &[CapeXPrecip],
    &[RelativeHumidity],
    &[ShortwaveRadiation],
    &[AirTemperature],
    &[SurfacePressure],
    &[Precip],
    &[WindSpeed],
    &[ShortwaveRadiation, AirTemperature],
    &[ShortwaveRadiation, AirTemperature, RelativeHumidity],
    &[ShortwaveRadiation, AirTemperature, RelativeHumidity, WindSpeed],
    &[
        ShortwaveRadiation,
        AirTemperature,
        RelativeHumidity,
        WindSpeed,
        Precip,
    ],
    &[
        ShortwaveRadiation,
        AirTemperature,
        RelativeHumidity,
        WindSpeed,
        Precip,
        SurfacePressure,
    ],
];

/// Schedule of `family` over [`SUBSETS`], ids `<prefix>1..<prefix>13`
pub fn subset_schedule(family: FamilyKind) -> Vec<ModelSpec> {
    SUBSETS
        .iter()
        .enumerate()
        .map(|(i, covariates)| {
            ModelSpec::new(format!("{}{}", family.id_prefix(), i + 1), covariates.to_vec())
        })
        .collect()
}

/// N1..N13
pub fn linear_schedule() -> Vec<ModelSpec> {
    subset_schedule(FamilyKind::Linear)
}

/// G1..G13
pub fn glm_schedule() -> Vec<ModelSpec> {
    subset_schedule(FamilyKind::GammaGlm)
}

/// How α(x) and β(x) depend on the coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameterization {
    /// α, β affine in x, constrained positive at every training point
    Linear,
    /// log α, log β affine in x
    LogLinear,
}

/// One Bayesian program: covariates, parameterization and prior scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesTier {
    /// Model spec (`B1`..`B5`)
    pub spec: ModelSpec,
    /// Link of the shape and rate
    pub parameterization: Parameterization,
    /// Standard deviation of the zero-mean normal prior on every coefficient
    pub prior_sd: f64,
}

/// B1..B5
pub fn bayes_tiers() -> Vec<BayesTier> {
    let tiers: [(&[Covariate], Parameterization, f64); 5] = [
        (SUBSETS[0], Parameterization::Linear, 10.0),
        (SUBSETS[8], Parameterization::Linear, 10.0),
        (SUBSETS[9], Parameterization::LogLinear, 5.0),
        (SUBSETS[10], Parameterization::LogLinear, 2.0),
        (SUBSETS[12], Parameterization::LogLinear, 1.0),
    ];

    tiers
        .iter()
        .enumerate()
        .map(|(i, (covariates, parameterization, prior_sd))| BayesTier {
            spec: ModelSpec::new(format!("B{}", i + 1), covariates.to_vec()),
            parameterization: *parameterization,
            prior_sd: *prior_sd,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_schedule_order() {
        let schedule = linear_schedule();
        assert_eq!(schedule.len(), 13);
        assert_eq!(schedule[0].id, "N1");
        assert_eq!(schedule[0].predictors(), "CAPE");
        assert_eq!(schedule[1].predictors(), "CAPE×P");
        assert_eq!(schedule[8].predictors(), "SWR + T");
        assert_eq!(schedule[12].id, "N13");
        assert_eq!(schedule[12].predictors(), "SWR + T + RH + W + P + SP");
    }

    #[test]
    fn test_glm_schedule_ids() {
        let ids: Vec<_> = glm_schedule().into_iter().map(|s| s.id).collect();
        assert_eq!(ids.first().map(String::as_str), Some("G1"));
        assert_eq!(ids.last().map(String::as_str), Some("G13"));
    }

    #[test]
    fn test_bayes_tiers() {
        let tiers = bayes_tiers();
        assert_eq!(tiers.len(), 5);
        assert_eq!(tiers[0].spec.covariates, vec![Cape]);
        assert_eq!(tiers[1].parameterization, Parameterization::Linear);
        assert_eq!(tiers[2].parameterization, Parameterization::LogLinear);
        assert_eq!(tiers[4].spec.covariates.len(), 6);
        let sds: Vec<f64> = tiers.iter().map(|t| t.prior_sd).collect();
        assert_eq!(sds, vec![10.0, 10.0, 5.0, 2.0, 1.0]);
    }
}
