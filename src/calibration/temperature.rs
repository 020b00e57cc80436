//! Temperature scaling: rescales the logit of `x` by `1/T`, fit by a coarse
//! then refined grid search minimizing log-loss (no closed form for `T`).

use super::types::{sigmoid, CalibrationDataPoint, CalibrationParameters};

const CLIP: f64 = 1e-6;

fn logit(x: f64) -> f64 {
    let xc = x.clamp(CLIP, 1.0 - CLIP);
    (xc / (1.0 - xc)).ln()
}

fn log_loss_for(points: &[CalibrationDataPoint], t: f64) -> f64 {
    let n = points.len() as f64;
    points
        .iter()
        .map(|p| {
            let pred = sigmoid(logit(p.confidence) / t).clamp(CLIP, 1.0 - CLIP);
            let label = if p.is_actual_phi { 1.0 } else { 0.0 };
            -(label * pred.ln() + (1.0 - label) * (1.0 - pred).ln())
        })
        .sum::<f64>()
        / n
}

pub fn fit(points: &[CalibrationDataPoint]) -> CalibrationParameters {
    let mut best_t = 1.0;
    let mut best_loss = f64::INFINITY;

    let mut lo = 0.05;
    let mut hi = 10.0;
    for _ in 0..6 {
        let steps = 40;
        for i in 0..=steps {
            let t = lo + (hi - lo) * (i as f64 / steps as f64);
            let loss = log_loss_for(points, t.max(CLIP));
            if loss < best_loss {
                best_loss = loss;
                best_t = t;
            }
        }
        let span = (hi - lo) / steps as f64 * 2.0;
        lo = (best_t - span).max(0.01);
        hi = best_t + span;
    }

    CalibrationParameters::Temperature { t: best_t.max(CLIP) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_like_data_fits_near_unit_temperature() {
        let points: Vec<CalibrationDataPoint> = (1..50)
            .map(|i| {
                let x = i as f64 / 50.0;
                CalibrationDataPoint { confidence: x, is_actual_phi: x > 0.5, filter_type: None }
            })
            .collect();
        let params = fit(&points);
        assert!(params.apply(0.9) > params.apply(0.1));
    }
}
