//! Canonical per-family tables
//!
//! Three tables leave the evaluator for every family: predictions aligned to
//! the test rows, one performance record per reported model, and the
//! fitted parameters rendered as `estimate ± 1.96·SE`.

use indexmap::IndexMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::base::{Coefficient, FittedModel, ModelError, Result};
use crate::metrics::SkillScores;

/// Number of parameter slots (`a` to `g`)
pub const PARAMETER_SLOTS: usize = 7;

/// Predicted strike rates per model, aligned with the test rows
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    observed: Array1<f64>,
    columns: IndexMap<String, Array1<f64>>,
}

impl PredictionTable {
    /// Empty table over the observed test response
    pub fn new(observed: Array1<f64>) -> Self {
        Self {
            observed,
            columns: IndexMap::new(),
        }
    }

    /// Add or replace the column of `id`
    pub fn insert(&mut self, id: impl Into<String>, predictions: Array1<f64>) -> Result<()> {
        if predictions.len() != self.observed.len() {
            return Err(ModelError::LengthMismatch {
                left: self.observed.len(),
                right: predictions.len(),
            });
        }
        self.columns.insert(id.into(), predictions);
        Ok(())
    }

    /// Observed test response
    pub fn observed(&self) -> &Array1<f64> {
        &self.observed
    }

    /// Predictions of one model
    pub fn get(&self, id: &str) -> Option<&Array1<f64>> {
        self.columns.get(id)
    }

    /// Model identifiers in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// All prediction columns in insertion order
    pub fn columns(&self) -> &IndexMap<String, Array1<f64>> {
        &self.columns
    }

    /// Number of test rows
    pub fn n_rows(&self) -> usize {
        self.observed.len()
    }

    /// Number of model columns
    pub fn n_models(&self) -> usize {
        self.columns.len()
    }
}

/// One row of the performance table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub model_name: String,
    pub fitting_function: String,
    pub distribution: String,
    pub predictors: String,
    pub group_name: String,
    pub rmse: f64,
    /// Empty when a series was constant
    pub cor: Option<f64>,
    pub sscore: f64,
}

impl PerformanceRecord {
    /// Column names, in field order
    pub const HEADER: [&'static str; 8] = [
        "model_name",
        "fitting_function",
        "distribution",
        "predictors",
        "group_name",
        "rmse",
        "cor",
        "sscore",
    ];

    /// Record for a fitted model and its held-out scores
    pub fn new(fitted: &FittedModel, scores: &SkillScores) -> Self {
        Self {
            model_name: fitted.id.clone(),
            fitting_function: fitted.form.fitting_function().to_string(),
            distribution: fitted.family.distribution().to_string(),
            predictors: fitted.predictors(),
            group_name: fitted.family.group_name().to_string(),
            rmse: scores.rmse,
            cor: scores.correlation,
            sscore: scores.s_score,
        }
    }
}

/// One row of the parameter table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    pub model_label: String,
    pub predictors: String,
    pub functional_form: String,
    pub a: Option<String>,
    pub b: Option<String>,
    pub c: Option<String>,
    pub d: Option<String>,
    pub e: Option<String>,
    pub f: Option<String>,
    pub g: Option<String>,
}

impl ParameterRow {
    /// Column names, in field order
    pub const HEADER: [&'static str; 3 + PARAMETER_SLOTS] = [
        "model_label",
        "predictors",
        "functional_form",
        "a",
        "b",
        "c",
        "d",
        "e",
        "f",
        "g",
    ];

    fn with_slots(model_label: String, fitted: &FittedModel, coefficients: &[&Coefficient]) -> Self {
        let mut slots: [Option<String>; PARAMETER_SLOTS] = Default::default();
        for (slot, coef) in slots.iter_mut().zip(coefficients) {
            *slot = Some(coef.formatted());
        }
        let [a, b, c, d, e, f, g] = slots;

        Self {
            model_label,
            predictors: fitted.predictors(),
            functional_form: fitted.form.to_string(),
            a,
            b,
            c,
            d,
            e,
            f,
            g,
        }
    }

    /// Rows of one fitted model
    ///
    /// Shape/rate models give a `(shape)` and a `(rate)` row. Models
    /// without estimated parameters (ensemble, binned table) give none.
    pub fn rows(fitted: &FittedModel) -> Vec<ParameterRow> {
        if fitted.coefficients.is_empty() {
            return Vec::new();
        }

        let shape: Vec<&Coefficient> = fitted
            .coefficients
            .iter()
            .filter(|c| c.name.starts_with("shape:"))
            .collect();
        let rate: Vec<&Coefficient> = fitted
            .coefficients
            .iter()
            .filter(|c| c.name.starts_with("rate:"))
            .collect();

        if shape.is_empty() && rate.is_empty() {
            let all: Vec<&Coefficient> = fitted.coefficients.iter().collect();
            return vec![Self::with_slots(fitted.id.clone(), fitted, &all)];
        }

        vec![
            Self::with_slots(format!("{} (shape)", fitted.id), fitted, &shape),
            Self::with_slots(format!("{} (rate)", fitted.id), fitted, &rate),
        ]
    }

    /// Filled slots, in order
    pub fn slots(&self) -> Vec<Option<&str>> {
        [&self.a, &self.b, &self.c, &self.d, &self.e, &self.f, &self.g]
            .iter()
            .map(|s| s.as_deref())
            .collect()
    }
}
