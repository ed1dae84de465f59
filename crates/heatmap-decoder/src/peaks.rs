//! Normalization and local-maximum search

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::NORMALIZE_EPSILON;

/// A heatmap cell that passed both the threshold and local-maximum tests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Column index in the heatmap grid
    pub col: usize,
    /// Row index in the heatmap grid
    pub row: usize,
    /// Normalized score (0-1)
    pub score: f32,
}

/// Min-max normalize a heatmap into [0, 1].
///
/// Returns `None` when the grid is empty or contains non-finite values.
pub fn normalize(heatmap: ArrayView2<f32>, epsilon: f32) -> Option<Array2<f32>> {
    if heatmap.is_empty() {
        return None;
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in heatmap.iter() {
        if !v.is_finite() {
            return None;
        }
        min = min.min(v);
        max = max.max(v);
    }

    let range = max - min + epsilon;
    Some(heatmap.mapv(|v| (v - min) / range))
}

/// Find local maxima above `threshold` after normalization.
///
/// Only interior cells are evaluated; the outermost border never produces a
/// peak. A cell is a peak when it equals the maximum of its 3x3 window, so a
/// plateau of equal values yields one peak per plateau cell. Peaks come back
/// in raster order (row-major).
pub fn find_peaks(heatmap: ArrayView2<f32>, threshold: f32) -> Vec<Peak> {
    find_peaks_with_epsilon(heatmap, threshold, NORMALIZE_EPSILON)
}

pub(crate) fn find_peaks_with_epsilon(
    heatmap: ArrayView2<f32>,
    threshold: f32,
    epsilon: f32,
) -> Vec<Peak> {
    let (rows, cols) = heatmap.dim();
    if rows < 3 || cols < 3 || !threshold.is_finite() {
        return Vec::new();
    }

    let Some(norm) = normalize(heatmap, epsilon) else {
        return Vec::new();
    };

    let mut peaks = Vec::new();
    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            let score = norm[[row, col]];
            if score <= threshold {
                continue;
            }

            let window_max = norm
                .slice(s![row - 1..=row + 1, col - 1..=col + 1])
                .iter()
                .fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));

            if score == window_max {
                peaks.push(Peak { col, row, score });
            }
        }
    }

    peaks
}
