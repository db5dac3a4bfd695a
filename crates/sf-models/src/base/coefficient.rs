//! Coefficient definition

use serde::{Deserialize, Serialize};

use super::Z_95;

/// Coefficient estimate with its 95% half-width
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    /// Coefficient name
    pub name: String,
    /// Point estimate (or posterior mean)
    pub estimate: f64,
    /// Standard error (or posterior standard deviation)
    pub std_error: Option<f64>,
    /// Is this the intercept?
    pub is_intercept: bool,
}

impl Coefficient {
    /// Create a new coefficient
    pub fn new(name: impl Into<String>, estimate: f64) -> Self {
        Self {
            name: name.into(),
            estimate,
            std_error: None,
            is_intercept: false,
        }
    }

    /// Set standard error
    pub fn with_std_error(mut self, se: f64) -> Self {
        self.std_error = Some(se);
        self
    }

    /// Mark as intercept
    pub fn as_intercept(mut self) -> Self {
        self.is_intercept = true;
        self
    }

    /// 1.96 × standard error
    pub fn half_width(&self) -> Option<f64> {
        self.std_error.map(|se| Z_95 * se)
    }

    /// Render as `estimate ± half-width`
    pub fn formatted(&self) -> String {
        match self.half_width() {
            Some(hw) => format!("{} ± {}", signif(self.estimate), signif(hw)),
            None => signif(self.estimate),
        }
    }
}

/// Build coefficients from parallel name / estimate / standard-error slices
pub fn coefficients_from(
    names: &[String],
    estimates: &[f64],
    std_errors: &[f64],
    has_intercept: bool,
) -> Vec<Coefficient> {
    names
        .iter()
        .zip(estimates)
        .zip(std_errors)
        .enumerate()
        .map(|(i, ((name, &estimate), &se))| {
            let coef = Coefficient::new(name.clone(), estimate).with_std_error(se);
            if i == 0 && has_intercept {
                coef.as_intercept()
            } else {
                coef
            }
        })
        .collect()
}

/// Four significant digits, switching to scientific notation for extremes
fn signif(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs().log10().floor() as i32;
    let decimals = 3 - magnitude;
    if (0..=8).contains(&decimals) {
        format!("{:.*}", decimals as usize, value)
    } else {
        format!("{:.3e}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_with_half_width() {
        let coef = Coefficient::new("CAPE", 2.0).with_std_error(0.5);
        assert_eq!(coef.half_width(), Some(0.98));
        assert_eq!(coef.formatted(), "2.000 ± 0.9800");
    }

    #[test]
    fn test_formatted_without_half_width() {
        assert_eq!(Coefficient::new("a", 12.5).formatted(), "12.50");
    }

    #[test]
    fn test_signif_extremes() {
        assert_eq!(signif(0.0), "0");
        assert_eq!(signif(123456.0), "1.235e5");
        assert_eq!(signif(0.0000012346), "1.235e-6");
        assert_eq!(signif(0.012346), "0.01235");
    }
}
