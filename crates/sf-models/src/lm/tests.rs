//! Tests for linear regression models

use approx::assert_abs_diff_eq;
use ndarray::array;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::{
    base::{FamilyKind, ModelError, ModelFamily, ModelSpec, Predict},
    glm::GammaGlmFamily,
    lm::{LinearFamily, LinearRegression},
    metrics::{correlation, rmse},
};
use sf_core::{Covariate, DatasetSplitter, Panel, PanelBuilder, Standardizer};

// ==================== Test Fixtures ====================

fn panel(cape: Vec<f64>, strikes: Vec<f64>) -> Panel {
    PanelBuilder::new()
        .with_covariate(Covariate::Cape, cape)
        .unwrap()
        .with_column("strikes", strikes)
        .unwrap()
        .build()
        .unwrap()
}

/// strikes = 2·cape + N(0, σ²)
fn noisy_panel(n: usize, sigma: f64, seed: u64) -> Panel {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let uniform = Uniform::new(0.0, 10.0).unwrap();
    let noise = Normal::new(0.0, sigma).unwrap();

    let cape: Vec<f64> = (0..n).map(|_| uniform.sample(&mut rng)).collect();
    let strikes: Vec<f64> = cape
        .iter()
        .map(|&x| 2.0 * x + noise.sample(&mut rng))
        .collect();

    panel(cape, strikes)
}

fn cape_spec() -> ModelSpec {
    ModelSpec::new("N1", vec![Covariate::Cape])
}

// ==================== OLS ====================

#[test]
fn test_linear_regression_basic_fit() {
    // y = 1 + 2x
    let x = array![[1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0], [1.0, 5.0]];
    let y = array![3.0, 5.0, 7.0, 9.0, 11.0];

    let result = LinearRegression::new().fit(&x, &y).unwrap();

    assert_abs_diff_eq!(result.coefficients, array![1.0, 2.0], epsilon = 1e-10);
    assert_abs_diff_eq!(result.fitted_values, y, epsilon = 1e-10);
    assert_abs_diff_eq!(result.statistics.r_squared.unwrap(), 1.0, epsilon = 1e-10);
    assert_eq!(result.statistics.df_residual, Some(3));
    assert_eq!(result.n_obs(), 5);
    assert_eq!(result.n_predictors(), 2);
}

#[test]
fn test_linear_regression_standard_errors() {
    let x = array![[1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]];
    let y = array![1.0, 3.0, 2.0, 4.0];

    let result = LinearRegression::new().fit(&x, &y).unwrap();

    // β = (0.5, 0.8), RSS = 1.8, σ² = 0.9, (X'X)⁻¹ = [[1.5, -0.5], [-0.5, 0.2]]
    assert_abs_diff_eq!(result.coefficients, array![0.5, 0.8], epsilon = 1e-10);
    assert_abs_diff_eq!(result.statistics.rss.unwrap(), 1.8, epsilon = 1e-10);
    assert_abs_diff_eq!(result.standard_errors[0], (0.9f64 * 1.5).sqrt(), epsilon = 1e-10);
    assert_abs_diff_eq!(result.standard_errors[1], (0.9f64 * 0.2).sqrt(), epsilon = 1e-10);

    let coefficients = result.to_coefficients(&["(Intercept)".to_string(), "CAPE".to_string()]);
    assert!(coefficients[0].is_intercept);
    assert!(!coefficients[1].is_intercept);
    assert_abs_diff_eq!(
        coefficients[1].half_width().unwrap(),
        1.96 * (0.18f64).sqrt(),
        epsilon = 1e-10
    );
}

#[test]
fn test_linear_regression_insufficient_data() {
    let x = array![[1.0, 1.0], [1.0, 2.0]];
    let y = array![1.0, 2.0];
    assert!(matches!(
        LinearRegression::new().fit(&x, &y),
        Err(ModelError::InsufficientData {
            n_samples: 2,
            n_parameters: 2
        })
    ));
}

#[test]
fn test_linear_regression_collinear_design() {
    let x = array![[1.0, 2.0], [1.0, 2.0], [1.0, 2.0], [1.0, 2.0]];
    let y = array![1.0, 2.0, 3.0, 4.0];
    assert!(matches!(
        LinearRegression::new().fit(&x, &y),
        Err(ModelError::SingularMatrix(_))
    ));
}

// ==================== Family ====================

#[test]
fn test_family_fit_and_predict() {
    let train = panel(vec![1.0, 2.0, 3.0, 4.0], vec![3.0, 5.0, 7.0, 9.0]);
    let model = LinearFamily::new().fit(&cape_spec(), &train).unwrap();

    let fitted = model.fitted();
    assert_eq!(fitted.id, "N1");
    assert_eq!(fitted.family, FamilyKind::Linear);
    assert_eq!(fitted.predictors(), "CAPE");
    assert_eq!(fitted.coefficients.len(), 2);
    assert_eq!(fitted.coefficients[1].name, "CAPE");

    let test = panel(vec![10.0, -3.0], vec![0.0, 0.0]);
    assert_abs_diff_eq!(
        model.predict(&test).unwrap(),
        array![21.0, -5.0],
        epsilon = 1e-10
    );
}

#[test]
fn test_family_missing_covariate() {
    let train = panel(vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]);
    let spec = ModelSpec::new("N3", vec![Covariate::RelativeHumidity]);
    assert!(matches!(
        LinearFamily::new().fit(&spec, &train),
        Err(ModelError::Data(_))
    ));
}

#[test]
fn test_end_to_end_known_linear_relationship() {
    let sigma = 1.0;
    let data = noisy_panel(100, sigma, 42);

    let (train, test, _) = DatasetSplitter::default().split(&data).unwrap();
    let stats = Standardizer::fit(&train, &[Covariate::Cape]).unwrap();
    let train = Standardizer::apply(&stats, &train).unwrap();
    let test = Standardizer::apply(&stats, &test).unwrap();

    let model = LinearFamily::new().fit(&cape_spec(), &train).unwrap();
    let predictions = model.predict(&test).unwrap();
    let observed = test.strikes().unwrap();

    // Irreducible noise bounds RMSE below by about σ
    assert!(rmse(observed.view(), predictions.view()).unwrap() < 1.5 * sigma);
    assert!(correlation(observed.view(), predictions.view()).unwrap() > 0.9);
}

#[test]
fn test_linear_can_go_negative_where_glm_cannot() {
    // Positive rates rising with CAPE
    let cape: Vec<f64> = (1..=20).map(|i| i as f64).collect();
    let strikes: Vec<f64> = cape.iter().map(|&x| 0.5 + 0.3 * x).collect();
    let train = panel(cape, strikes);

    let linear = LinearFamily::new().fit(&cape_spec(), &train).unwrap();
    let glm = GammaGlmFamily::default().fit(&cape_spec(), &train).unwrap();

    // Far below the training range
    let test = panel(vec![-30.0, -100.0], vec![1.0, 1.0]);
    let linear_pred = linear.predict(&test).unwrap();
    let glm_pred = glm.predict(&test).unwrap();

    assert!(linear_pred.iter().all(|&p| p < 0.0));
    assert!(glm_pred.iter().all(|&p| p > 0.0));
}
