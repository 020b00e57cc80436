//! Beta calibration: `sigmoid(a*log(x) + b*log(1-x) + c)` fit by gradient
//! ascent on the data log-likelihood.

use super::types::{sigmoid, CalibrationDataPoint, CalibrationParameters};

const LEARNING_RATE: f64 = 0.05;
const ITERATIONS: usize = 500;
const CLIP: f64 = 1e-6;

pub fn fit(points: &[CalibrationDataPoint]) -> CalibrationParameters {
    let n = points.len() as f64;
    let mut a = 1.0f64;
    let mut b = 1.0f64;
    let mut c = 0.0f64;

    let features: Vec<(f64, f64, f64)> = points
        .iter()
        .map(|p| {
            let x = p.confidence.clamp(CLIP, 1.0 - CLIP);
            (x.ln(), (1.0 - x).ln(), if p.is_actual_phi { 1.0 } else { 0.0 })
        })
        .collect();

    for _ in 0..ITERATIONS {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        let mut grad_c = 0.0;
        for &(log_x, log_1mx, label) in &features {
            let pred = sigmoid(a * log_x + b * log_1mx + c);
            let err = pred - label;
            grad_a += err * log_x;
            grad_b += err * log_1mx;
            grad_c += err;
        }
        a -= LEARNING_RATE * grad_a / n;
        b -= LEARNING_RATE * grad_b / n;
        c -= LEARNING_RATE * grad_c / n;
    }

    CalibrationParameters::Beta { a, b, c }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_monotone_mapping_on_separable_data() {
        let mut points = Vec::new();
        for i in 1..50 {
            let x = i as f64 / 50.0;
            points.push(CalibrationDataPoint {
                confidence: x,
                is_actual_phi: x > 0.5,
                filter_type: None,
            });
        }
        let params = fit(&points);
        assert!(params.apply(0.9) > params.apply(0.1));
    }
}
