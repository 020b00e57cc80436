//! Isotonic regression fit by pool-adjacent-violators (PAVA).

use super::types::{CalibrationDataPoint, CalibrationParameters};

pub fn fit(points: &[CalibrationDataPoint]) -> CalibrationParameters {
    let mut sorted: Vec<&CalibrationDataPoint> = points.iter().collect();
    sorted.sort_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap());

    // Each pooled block starts as a single point: (sum_x, sum_y, weight).
    let mut blocks: Vec<(f64, f64, f64)> = sorted
        .iter()
        .map(|p| (p.confidence, if p.is_actual_phi { 1.0 } else { 0.0 }, 1.0))
        .collect();

    let mut i = 0;
    while i + 1 < blocks.len() {
        let mean_i = blocks[i].1 / blocks[i].2;
        let mean_next = blocks[i + 1].1 / blocks[i + 1].2;
        if mean_i > mean_next {
            let merged = (
                blocks[i].0 + blocks[i + 1].0,
                blocks[i].1 + blocks[i + 1].1,
                blocks[i].2 + blocks[i + 1].2,
            );
            blocks[i] = merged;
            blocks.remove(i + 1);
            if i > 0 {
                i -= 1;
            }
        } else {
            i += 1;
        }
    }

    let xs: Vec<f64> = blocks.iter().map(|b| b.0 / b.2).collect();
    let ys: Vec<f64> = blocks.iter().map(|b| b.1 / b.2).collect();

    CalibrationParameters::Isotonic { xs, ys }
}
