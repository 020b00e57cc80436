//! Platt scaling: `sigmoid(a*x + b)` fit by weighted logistic regression.

use super::types::{sigmoid, CalibrationDataPoint, CalibrationParameters};

const LEARNING_RATE: f64 = 0.1;
const ITERATIONS: usize = 500;

pub fn fit(points: &[CalibrationDataPoint]) -> CalibrationParameters {
    let n = points.len() as f64;
    let mut a = 1.0f64;
    let mut b = 0.0f64;

    for _ in 0..ITERATIONS {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for p in points {
            let pred = sigmoid(a * p.confidence + b);
            let label = if p.is_actual_phi { 1.0 } else { 0.0 };
            let err = pred - label;
            grad_a += err * p.confidence;
            grad_b += err;
        }
        a -= LEARNING_RATE * grad_a / n;
        b -= LEARNING_RATE * grad_b / n;
    }

    CalibrationParameters::Platt { a, b }
}
