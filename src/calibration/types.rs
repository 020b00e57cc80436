//! Shared calibration types (spec.md #3, #4.C).

use crate::span::FilterType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One labeled training example: a raw detector score and whether the span
/// it came from was, in fact, PHI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationDataPoint {
    pub confidence: f64,
    pub is_actual_phi: bool,
    pub filter_type: Option<FilterType>,
}

/// The calibrator variant a [`CalibrationParameters`] value was fit with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMethod {
    Platt,
    Isotonic,
    Beta,
    Temperature,
}

/// Fitted parameters for one calibrator variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum CalibrationParameters {
    Platt { a: f64, b: f64 },
    Isotonic { xs: Vec<f64>, ys: Vec<f64> },
    Beta { a: f64, b: f64, c: f64 },
    Temperature { t: f64 },
}

impl CalibrationParameters {
    pub fn method(&self) -> CalibrationMethod {
        match self {
            CalibrationParameters::Platt { .. } => CalibrationMethod::Platt,
            CalibrationParameters::Isotonic { .. } => CalibrationMethod::Isotonic,
            CalibrationParameters::Beta { .. } => CalibrationMethod::Beta,
            CalibrationParameters::Temperature { .. } => CalibrationMethod::Temperature,
        }
    }

    /// Applies the fitted mapping to a raw score, clamped to `[0, 1]`.
    pub fn apply(&self, x: f64) -> f64 {
        let y = match self {
            CalibrationParameters::Platt { a, b } => sigmoid(a * x + b),
            CalibrationParameters::Isotonic { xs, ys } => isotonic_eval(xs, ys, x),
            CalibrationParameters::Beta { a, b, c } => {
                let xc = x.clamp(1e-6, 1.0 - 1e-6);
                sigmoid(a * xc.ln() + b * (1.0 - xc).ln() + c)
            }
            CalibrationParameters::Temperature { t } => {
                let xc = x.clamp(1e-6, 1.0 - 1e-6);
                let logit = (xc / (1.0 - xc)).ln();
                sigmoid(logit / t.max(1e-6))
            }
        };
        y.clamp(0.0, 1.0)
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Binary search over the isotonic step function, linearly interpolating
/// between neighboring knots so `apply` stays continuous.
fn isotonic_eval(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    if xs.is_empty() {
        return x;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= *xs.last().unwrap() {
        return *ys.last().unwrap();
    }
    let idx = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let (y0, y1) = (ys[idx - 1], ys[idx]);
    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Reliability metrics over 10 equal-width bins (spec.md #4.C).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReliabilityMetrics {
    pub ece: f64,
    pub mce: f64,
    pub brier: f64,
    pub log_loss: f64,
}

/// Envelope metadata stored alongside fitted parameters on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationMetadata {
    pub version: String,
    pub fitted_at: DateTime<Utc>,
    pub data_point_count: usize,
    pub preferred_method: CalibrationMethod,
    pub metrics: Option<ReliabilityMetrics>,
    pub source_files: Vec<String>,
}

pub const CALIBRATION_SCHEMA_VERSION: &str = "1.0.0";
