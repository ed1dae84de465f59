//! Peak to bounding box mapping

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::peaks::{find_peaks_with_epsilon, Peak};
use crate::DecoderConfig;

/// Face bounding box in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Normalized heatmap score of the originating peak
    pub score: f32,
}

impl FaceBox {
    /// Box center in pixels
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Heatmap decoder with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct HeatmapDecoder {
    config: DecoderConfig,
}

impl HeatmapDecoder {
    /// Create a new decoder
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a heatmap into face boxes for an image of the given size.
    ///
    /// Output follows the raster order of the peaks. Boxes are clamped to the
    /// image and dropped when nothing of them remains inside it.
    pub fn decode(
        &self,
        heatmap: ArrayView2<f32>,
        image_width: u32,
        image_height: u32,
    ) -> Vec<FaceBox> {
        let (rows, cols) = heatmap.dim();
        if rows == 0 || cols == 0 || image_width == 0 || image_height == 0 {
            debug!(
                "Skipping decode: heatmap {}x{}, image {}x{}",
                rows, cols, image_width, image_height
            );
            return Vec::new();
        }

        let peaks = find_peaks_with_epsilon(heatmap, self.config.threshold, self.config.epsilon);

        let scale_x = image_width as f32 / cols as f32;
        let scale_y = image_height as f32 / rows as f32;
        let box_width = (self.config.box_size as f32 * scale_x) as i64;
        let box_height = (self.config.box_size as f32 * scale_y) as i64;

        let boxes: Vec<FaceBox> = peaks
            .iter()
            .filter_map(|peak| {
                peak_to_box(
                    peak,
                    (scale_x, scale_y),
                    (box_width, box_height),
                    (image_width, image_height),
                )
            })
            .collect();

        debug!("Decoded {} peaks into {} boxes", peaks.len(), boxes.len());
        boxes
    }

    /// Number of faces in a heatmap
    pub fn count(&self, heatmap: ArrayView2<f32>, image_width: u32, image_height: u32) -> usize {
        self.decode(heatmap, image_width, image_height).len()
    }
}

fn peak_to_box(
    peak: &Peak,
    (scale_x, scale_y): (f32, f32),
    (box_width, box_height): (i64, i64),
    (image_width, image_height): (u32, u32),
) -> Option<FaceBox> {
    let center_x = (peak.col as f32 * scale_x) as i64;
    let center_y = (peak.row as f32 * scale_y) as i64;

    let x1 = (center_x - box_width / 2).max(0);
    let y1 = (center_y - box_height / 2).max(0);
    let x2 = (center_x + box_width / 2).min(image_width as i64);
    let y2 = (center_y + box_height / 2).min(image_height as i64);

    let width = x2 - x1;
    let height = y2 - y1;
    if width <= 0 || height <= 0 {
        return None;
    }

    Some(FaceBox {
        x: x1 as u32,
        y: y1 as u32,
        width: width as u32,
        height: height as u32,
        score: peak.score,
    })
}

/// Decode with the default box size and the given threshold
pub fn decode(
    heatmap: ArrayView2<f32>,
    threshold: f32,
    image_width: u32,
    image_height: u32,
) -> Vec<FaceBox> {
    HeatmapDecoder::new(DecoderConfig::with_threshold(threshold)).decode(
        heatmap,
        image_width,
        image_height,
    )
}

/// Decode a flat row-major buffer. A buffer whose length is not
/// `rows * cols` is treated as malformed and yields no detections.
pub fn decode_flat(
    values: &[f32],
    rows: usize,
    cols: usize,
    threshold: f32,
    image_width: u32,
    image_height: u32,
) -> Vec<FaceBox> {
    if rows.checked_mul(cols) != Some(values.len()) {
        debug!(
            "Malformed heatmap buffer: {} values for {}x{}",
            values.len(),
            rows,
            cols
        );
        return Vec::new();
    }

    match ArrayView2::from_shape((rows, cols), values) {
        Ok(view) => decode(view, threshold, image_width, image_height),
        Err(e) => {
            debug!("Malformed heatmap buffer: {}", e);
            Vec::new()
        }
    }
}
