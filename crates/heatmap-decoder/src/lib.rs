//! Heatmap Decoder
//!
//! Turns the 2-D confidence grid produced by the face-presence model into
//! discrete face detections:
//! - Min-max normalization of the whole grid
//! - 3x3 local-maximum peak search over interior cells
//! - Grid-to-image coordinate mapping with fixed-size, clamped boxes
//!
//! Decoding is total: malformed input yields an empty detection list, so
//! callers treat "no faces" and "could not decode" the same way.

mod decoder;
mod peaks;

pub use decoder::{decode, decode_flat, FaceBox, HeatmapDecoder};
pub use peaks::{find_peaks, normalize, Peak};

use serde::{Deserialize, Serialize};

/// Default normalized confidence a peak must exceed
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Default box edge length, in heatmap cells
pub const DEFAULT_BOX_SIZE: u32 = 100;

/// Guard against division by zero on a flat heatmap
pub const NORMALIZE_EPSILON: f32 = 1e-8;

/// Decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Normalized score a cell must strictly exceed to become a peak
    pub threshold: f32,

    /// Box edge length in heatmap cells, scaled to image pixels per axis
    pub box_size: u32,

    /// Added to the normalization range
    pub epsilon: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            box_size: DEFAULT_BOX_SIZE,
            epsilon: NORMALIZE_EPSILON,
        }
    }
}

impl DecoderConfig {
    /// Config with a custom threshold and default box size
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }
}
