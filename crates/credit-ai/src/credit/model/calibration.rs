use serde::{Deserialize, Serialize};

use super::ModelError;

/// Post-hoc mapping from classifier margin to a calibrated default probability.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Calibration {
    /// Plain logistic link on the margin.
    #[default]
    None,
    /// Platt scaling: `1 / (1 + exp(a * margin + b))`.
    Sigmoid { a: f64, b: f64 },
    /// Piecewise-linear fit over the uncalibrated probability.
    Isotonic {
        thresholds: Vec<f64>,
        values: Vec<f64>,
    },
}

impl Calibration {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        match self {
            Calibration::None | Calibration::Sigmoid { .. } => Ok(()),
            Calibration::Isotonic { thresholds, values } => {
                if thresholds.is_empty() || thresholds.len() != values.len() {
                    return Err(ModelError::InvalidCalibration(format!(
                        "isotonic fit needs matching non-empty arrays (thresholds {}, values {})",
                        thresholds.len(),
                        values.len()
                    )));
                }
                if thresholds.windows(2).any(|pair| pair[0] > pair[1]) {
                    return Err(ModelError::InvalidCalibration(
                        "isotonic thresholds must be non-decreasing".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn probability(&self, margin: f64) -> f64 {
        match self {
            Calibration::None => logistic(margin),
            Calibration::Sigmoid { a, b } => 1.0 / (1.0 + (a * margin + b).exp()),
            Calibration::Isotonic { thresholds, values } => {
                interpolate(thresholds, values, logistic(margin))
            }
        }
    }
}

pub fn logistic(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

fn interpolate(thresholds: &[f64], values: &[f64], x: f64) -> f64 {
    let (Some(first), Some(last)) = (thresholds.first(), thresholds.last()) else {
        return x;
    };
    if x.is_nan() {
        return x;
    }
    if x <= *first {
        return values[0];
    }
    if x >= *last {
        return values[values.len() - 1];
    }

    let upper = thresholds.partition_point(|threshold| *threshold <= x);
    let lower = upper - 1;
    let (x0, x1) = (thresholds[lower], thresholds[upper]);
    let (y0, y1) = (values[lower], values[upper]);
    if (x1 - x0).abs() < f64::EPSILON {
        return y1;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}
