//! Confidence Calibrator (spec.md #4.C) and its on-disk persistence
//! (SPEC_FULL.md #4.C.1).

mod beta;
mod isotonic;
mod platt;
pub mod persistence;
mod temperature;
pub mod types;

use crate::error::{Error, Result};
use crate::span::FilterType;
use std::collections::HashMap;
pub use types::{
    CalibrationDataPoint, CalibrationMethod, CalibrationParameters, ReliabilityMetrics,
};

pub const DEFAULT_MIN_DATA_POINTS: usize = 50;
const RELIABILITY_BINS: usize = 10;

#[derive(Debug, Clone)]
struct FittedModel {
    parameters: CalibrationParameters,
    metrics: ReliabilityMetrics,
}

/// Maps raw detector scores to calibrated probabilities, globally or per
/// [`FilterType`], via one of the four variants in spec.md #4.C.
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    global: Option<FittedModel>,
    per_filter: HashMap<FilterType, FittedModel>,
    min_data_points: usize,
}

impl Calibrator {
    pub fn new() -> Self {
        Self {
            global: None,
            per_filter: HashMap::new(),
            min_data_points: DEFAULT_MIN_DATA_POINTS,
        }
    }

    pub fn with_min_data_points(min_data_points: usize) -> Self {
        Self {
            min_data_points,
            ..Self::new()
        }
    }

    /// Fits a global model from every point, plus a per-filter model for any
    /// [`FilterType`] with enough of its own labeled points.
    pub fn fit(&mut self, method: CalibrationMethod, points: &[CalibrationDataPoint]) -> Result<()> {
        if points.len() < self.min_data_points {
            log::warn!(
                "calibration fit rejected: {} point(s) supplied, need at least {}",
                points.len(),
                self.min_data_points
            );
            return Err(Error::InsufficientData {
                have: points.len(),
                need: self.min_data_points,
            });
        }

        self.global = Some(fit_one(method, points));

        let mut by_filter: HashMap<FilterType, Vec<CalibrationDataPoint>> = HashMap::new();
        for p in points {
            if let Some(ft) = p.filter_type {
                by_filter.entry(ft).or_default().push(*p);
            }
        }
        self.per_filter.clear();
        for (ft, pts) in by_filter {
            if pts.len() >= self.min_data_points {
                self.per_filter.insert(ft, fit_one(method, &pts));
            }
        }

        Ok(())
    }

    /// Calibrates a raw score. Falls back to the uncalibrated raw value if no
    /// model (global or per-filter) has been fit yet, per spec.md #7.
    pub fn calibrate(&self, x: f64, filter_type: Option<FilterType>) -> f64 {
        if let Some(ft) = filter_type {
            if let Some(model) = self.per_filter.get(&ft) {
                return model.parameters.apply(x);
            }
        }
        match &self.global {
            Some(model) => model.parameters.apply(x),
            None => x.clamp(0.0, 1.0),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.global.is_some()
    }

    pub fn global_metrics(&self) -> Option<ReliabilityMetrics> {
        self.global.as_ref().map(|m| m.metrics)
    }

    pub fn global_parameters(&self) -> Option<&CalibrationParameters> {
        self.global.as_ref().map(|m| &m.parameters)
    }

    pub fn per_filter_parameters(&self) -> impl Iterator<Item = (FilterType, &CalibrationParameters)> {
        self.per_filter.iter().map(|(ft, m)| (*ft, &m.parameters))
    }

    /// Reconstructs a calibrator directly from previously-fit parameters,
    /// used by [`persistence::import`] to restore a saved calibration file
    /// without re-running the fit.
    pub(crate) fn load_fitted(
        &mut self,
        global: CalibrationParameters,
        global_metrics: ReliabilityMetrics,
        per_filter: HashMap<FilterType, CalibrationParameters>,
    ) {
        self.global = Some(FittedModel {
            parameters: global,
            metrics: global_metrics,
        });
        self.per_filter = per_filter
            .into_iter()
            .map(|(ft, parameters)| {
                (
                    ft,
                    FittedModel {
                        parameters,
                        metrics: global_metrics,
                    },
                )
            })
            .collect();
    }
}

fn fit_one(method: CalibrationMethod, points: &[CalibrationDataPoint]) -> FittedModel {
    let parameters = match method {
        CalibrationMethod::Platt => platt::fit(points),
        CalibrationMethod::Isotonic => isotonic::fit(points),
        CalibrationMethod::Beta => beta::fit(points),
        CalibrationMethod::Temperature => temperature::fit(points),
    };
    let metrics = compute_metrics(&parameters, points);
    FittedModel { parameters, metrics }
}

/// ECE/MCE/Brier/LogLoss over `RELIABILITY_BINS` equal-width bins on the
/// calibrated output.
fn compute_metrics(parameters: &CalibrationParameters, points: &[CalibrationDataPoint]) -> ReliabilityMetrics {
    if points.is_empty() {
        return ReliabilityMetrics::default();
    }

    let mut bin_sum_conf = vec![0.0; RELIABILITY_BINS];
    let mut bin_sum_acc = vec![0.0; RELIABILITY_BINS];
    let mut bin_count = vec![0usize; RELIABILITY_BINS];

    let mut brier_sum = 0.0;
    let mut log_loss_sum = 0.0;

    for p in points {
        let calibrated = parameters.apply(p.confidence);
        let label = if p.is_actual_phi { 1.0 } else { 0.0 };

        brier_sum += (calibrated - label).powi(2);
        let clipped = calibrated.clamp(1e-9, 1.0 - 1e-9);
        log_loss_sum -= label * clipped.ln() + (1.0 - label) * (1.0 - clipped).ln();

        let bin = ((calibrated * RELIABILITY_BINS as f64) as usize).min(RELIABILITY_BINS - 1);
        bin_sum_conf[bin] += calibrated;
        bin_sum_acc[bin] += label;
        bin_count[bin] += 1;
    }

    let n = points.len() as f64;
    let mut ece = 0.0;
    let mut mce = 0.0f64;
    for bin in 0..RELIABILITY_BINS {
        if bin_count[bin] == 0 {
            continue;
        }
        let count = bin_count[bin] as f64;
        let avg_conf = bin_sum_conf[bin] / count;
        let avg_acc = bin_sum_acc[bin] / count;
        let gap = (avg_conf - avg_acc).abs();
        ece += (count / n) * gap;
        mce = mce.max(gap);
    }

    ReliabilityMetrics {
        ece,
        mce,
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_points(n: usize) -> Vec<CalibrationDataPoint> {
        (0..n)
            .map(|i| {
                let x = (i as f64 + 0.5) / n as f64;
                CalibrationDataPoint {
                    confidence: x,
                    is_actual_phi: x > 0.5,
                    filter_type: None,
                }
            })
            .collect()
    }

    #[test]
    fn fit_rejects_insufficient_data() {
        let mut calibrator = Calibrator::new();
        let points = synthetic_points(10);
        let err = calibrator.fit(CalibrationMethod::Platt, &points).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[test]
    fn uncalibrated_returns_raw_value() {
        let calibrator = Calibrator::new();
        assert_eq!(calibrator.calibrate(0.73, None), 0.73);
    }

    #[test]
    fn fitted_platt_is_monotone() {
        let mut calibrator = Calibrator::new();
        let points = synthetic_points(200);
        calibrator.fit(CalibrationMethod::Platt, &points).unwrap();
        assert!(calibrator.calibrate(0.9, None) > calibrator.calibrate(0.1, None));
    }

    #[test]
    fn per_filter_model_used_when_present() {
        let mut calibrator = Calibrator::new();
        let mut points = synthetic_points(200);
        for p in points.iter_mut().take(100) {
            p.filter_type = Some(FilterType::Ssn);
        }
        calibrator.fit(CalibrationMethod::Isotonic, &points).unwrap();
        // SSN had >= min_data_points of its own, so a dedicated model exists.
        let ssn_calibrated = calibrator.calibrate(0.5, Some(FilterType::Ssn));
        let global_calibrated = calibrator.calibrate(0.5, None);
        assert!((0.0..=1.0).contains(&ssn_calibrated));
        assert!((0.0..=1.0).contains(&global_calibrated));
    }

    #[test]
    fn synthetic_identity_calibration_is_close_to_raw() {
        let mut calibrator = Calibrator::new();
        let points = synthetic_points(1000);
        calibrator.fit(CalibrationMethod::Isotonic, &points).unwrap();
        for x in [0.1, 0.3, 0.5, 0.7, 0.9] {
            let y = calibrator.calibrate(x, None);
            assert!((y - x).abs() < 0.1, "x={x} y={y}");
        }
        assert!(calibrator.global_metrics().unwrap().ece < 0.1);
    }
}
