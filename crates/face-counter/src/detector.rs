//! Face detection: preprocessing, heatmap inference, decoding

use heatmap_decoder::{DecoderConfig, FaceBox, HeatmapDecoder};
use image::{DynamicImage, GenericImageView};
use std::path::Path;
use tracing::{debug, warn};

use crate::model::{HeatmapModel, OnnxHeatmapModel, StaticHeatmapModel};
use crate::preprocess::preprocess;
use crate::CounterError;

/// Heatmap face detector
pub struct FaceDetector {
    model: Box<dyn HeatmapModel>,
    decoder: HeatmapDecoder,
}

impl FaceDetector {
    pub fn new(model: Box<dyn HeatmapModel>, config: DecoderConfig) -> Self {
        Self {
            model,
            decoder: HeatmapDecoder::new(config),
        }
    }

    /// Detector backed by an ONNX model file, or by a model that sees no
    /// faces when `model_path` is `None`
    pub fn from_path(model_path: Option<&Path>, config: DecoderConfig) -> Result<Self, CounterError> {
        let model: Box<dyn HeatmapModel> = match model_path {
            Some(path) => Box::new(OnnxHeatmapModel::load(path)?),
            None => {
                warn!("No heatmap model configured. Every frame will count zero faces.");
                Box::new(StaticHeatmapModel::empty())
            }
        };
        Ok(Self::new(model, config))
    }

    /// Detect faces in a frame; boxes are in the frame's own pixel space.
    ///
    /// Inference failures are logged and reported as no detections.
    pub fn detect(&self, image: &DynamicImage) -> Vec<FaceBox> {
        let (width, height) = image.dimensions();
        let input = preprocess(image);

        let heatmap = match self.model.infer(&input) {
            Ok(heatmap) => heatmap,
            Err(e) => {
                warn!("Heatmap inference failed: {}", e);
                return Vec::new();
            }
        };

        let faces = self.decoder.decode(heatmap.view(), width, height);
        debug!("Detected {} face(s) in {}x{} frame", faces.len(), width, height);
        faces
    }

    pub fn count_faces(&self, image: &DynamicImage) -> usize {
        self.detect(image).len()
    }
}
