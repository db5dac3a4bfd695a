//! Tests for the power-law family and the C5 ensemble

use approx::assert_abs_diff_eq;
use ndarray::{Array1, array};

use crate::base::{BoxedModel, FunctionalForm, ModelError, ModelFamily, ModelSpec, Predict};
use crate::binned::{NonParametricBinFamily, binned_spec};
use crate::powerlaw::{
    ENSEMBLE_ID, EnsembleModel, ParametricPowerLawFamily, PowerLawConfig, PowerLawKind,
    power_law_schedule,
};
use sf_core::{Covariate, Panel, PanelBuilder};

// ==================== Test Fixtures ====================

fn panel(cxp: Vec<f64>, strikes: Vec<f64>) -> Panel {
    PanelBuilder::new()
        .with_covariate(Covariate::CapeXPrecip, cxp)
        .unwrap()
        .with_column("strikes", strikes)
        .unwrap()
        .build()
        .unwrap()
}

/// y = 2x on x ∈ {1, 2, 4, 8}
fn doubling_panel() -> Panel {
    panel(vec![1.0, 2.0, 4.0, 8.0], vec![2.0, 4.0, 8.0, 16.0])
}

fn exact_family() -> ParametricPowerLawFamily {
    ParametricPowerLawFamily::new(PowerLawConfig {
        log_epsilon: 0.0,
        ..PowerLawConfig::default()
    })
}

// ==================== Sub-models ====================

#[test]
fn test_schedule_ids() {
    let ids: Vec<String> = power_law_schedule().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["C1", "C2", "C3", "C4"]);
    assert_eq!(PowerLawKind::from_id("C3"), Some(PowerLawKind::Scale));
    assert_eq!(PowerLawKind::from_id("C5"), None);
    assert!(!PowerLawKind::Linear.is_reported());
}

#[test]
fn test_log_log_recovers_power_law() {
    let x: Vec<f64> = (1..=30).map(|i| i as f64 * 3.0).collect();
    let y: Vec<f64> = x.iter().map(|&v| 0.05 * v.powf(1.3)).collect();
    let train = panel(x, y);

    let model = exact_family().fit_kind(PowerLawKind::LogLog, &train).unwrap();
    let [a, b] = model.params();
    assert_abs_diff_eq!(a, 0.05f64.ln(), epsilon = 1e-9);
    assert_abs_diff_eq!(b, 1.3, epsilon = 1e-9);
    assert_eq!(model.fitted().form, FunctionalForm::LogLogPowerLaw);
}

#[test]
fn test_log_log_drops_non_positive_rows() {
    // The (0, 100) and (−1, 50) rows would wreck the fit if kept
    let train = panel(
        vec![0.0, -1.0, 1.0, 2.0, 4.0, 8.0],
        vec![100.0, 50.0, 2.0, 4.0, 8.0, 16.0],
    );
    let model = exact_family().fit_kind(PowerLawKind::LogLog, &train).unwrap();

    assert_eq!(model.fitted().statistics.n_obs, 4);
    assert_abs_diff_eq!(model.predict_value(3.0), 6.0, epsilon = 1e-9);
    assert!(model.predict_value(0.0).is_finite());
}

#[test]
fn test_nonlinear_power_law_from_unit_start() {
    let x: Vec<f64> = (1..=25).map(|i| i as f64 * 0.4).collect();
    let y: Vec<f64> = x.iter().map(|&v| 1.7 * v.powf(0.6)).collect();
    let train = panel(x, y);

    let model = ParametricPowerLawFamily::default()
        .fit_kind(PowerLawKind::Nonlinear, &train)
        .unwrap();
    let [a, b] = model.params();
    assert!(model.fitted().diagnostics.converged);
    assert_abs_diff_eq!(a, 1.7, epsilon = 1e-5);
    assert_abs_diff_eq!(b, 0.6, epsilon = 1e-5);
}

#[test]
fn test_scale_discards_intercept() {
    // y = 3 + 2x: the scale model keeps the slope only
    let train = panel(vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 7.0, 9.0, 11.0]);
    let model = ParametricPowerLawFamily::default()
        .fit_kind(PowerLawKind::Scale, &train)
        .unwrap();

    assert_abs_diff_eq!(model.params()[0], 2.0, epsilon = 1e-10);
    assert_eq!(model.fitted().coefficients.len(), 1);
    assert_abs_diff_eq!(model.predict_value(10.0), 20.0, epsilon = 1e-9);
}

#[test]
fn test_linear_nls() {
    let train = panel(vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 7.0, 9.0, 11.0]);
    let model = ParametricPowerLawFamily::default()
        .fit_kind(PowerLawKind::Linear, &train)
        .unwrap();

    assert_abs_diff_eq!(model.params()[0], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(model.params()[1], 3.0, epsilon = 1e-6);
}

#[test]
fn test_family_dispatches_on_id() {
    let train = doubling_panel();
    let family = exact_family();

    let c3 = family
        .fit(&ModelSpec::new("C3", vec![Covariate::CapeXPrecip]), &train)
        .unwrap();
    assert_eq!(c3.kind(), PowerLawKind::Scale);

    assert!(matches!(
        family.fit(&ModelSpec::new("C9", vec![Covariate::CapeXPrecip]), &train),
        Err(ModelError::InvalidConfig { .. })
    ));
}

// ==================== Ensemble ====================

#[test]
fn test_ensemble_mean_hand_computed() {
    let train = doubling_panel();
    let family = exact_family();

    let c1 = family.fit_kind(PowerLawKind::LogLog, &train).unwrap();
    let c2 = family.fit_kind(PowerLawKind::Nonlinear, &train).unwrap();
    let c3 = family.fit_kind(PowerLawKind::Scale, &train).unwrap();
    // Bins of width 1.75 from 1 to 8: means 3, 8, (empty), 16; global mean 7.5
    let np = NonParametricBinFamily::new(4)
        .fit(&binned_spec(), &train)
        .unwrap();

    let c5 = EnsembleModel::new(
        ENSEMBLE_ID,
        vec![
            Box::new(c1) as BoxedModel,
            Box::new(c2),
            Box::new(c3),
            Box::new(np),
        ],
    )
    .unwrap();
    assert_eq!(c5.member_ids(), vec!["C1", "C2", "C3", "NP"]);

    // Parametric members all predict 2x:
    //   x = 2.5: (5 + 5 + 5 + 3) / 4
    //   x = 5:   (10 + 10 + 10 + 7.5) / 4
    //   x = 8:   (16 + 16 + 16 + 16) / 4
    let test = panel(vec![2.5, 5.0, 8.0], vec![0.0; 3]);
    assert_abs_diff_eq!(
        c5.predict(&test).unwrap(),
        array![4.5, 9.375, 16.0],
        epsilon = 1e-6
    );
}

#[test]
fn test_ensemble_refuses_linear_member() {
    let train = doubling_panel();
    let c4 = ParametricPowerLawFamily::default()
        .fit_kind(PowerLawKind::Linear, &train)
        .unwrap();

    assert!(matches!(
        EnsembleModel::new(ENSEMBLE_ID, vec![Box::new(c4) as BoxedModel]),
        Err(ModelError::InvalidConfig { .. })
    ));
}

#[test]
fn test_combine_is_elementwise_mean() {
    let a = array![1.0, 2.0];
    let b = array![3.0, 6.0];
    let combined = EnsembleModel::combine(&[&a, &b]).unwrap();
    assert_abs_diff_eq!(combined, array![2.0, 4.0]);

    let short: Array1<f64> = array![1.0];
    assert!(matches!(
        EnsembleModel::combine(&[&a, &short]),
        Err(ModelError::LengthMismatch { .. })
    ));
}
