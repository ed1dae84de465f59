//! Heatmap model seam
//!
//! The detector only needs "tensor in, heatmap out". The ONNX session lives
//! behind [`HeatmapModel`] so tests and model-less runs can swap it out.

use ndarray::{Array2, Array4, ArrayViewD, Axis, Ix4};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::{debug, error, info};

use crate::CounterError;

/// Produces a 2-D confidence heatmap for one preprocessed frame
pub trait HeatmapModel: Send + Sync {
    fn infer(&self, input: &Array4<u16>) -> Result<Array2<f32>, CounterError>;
}

/// ONNX Runtime backed model
pub struct OnnxHeatmapModel {
    session: Session,
}

impl OnnxHeatmapModel {
    /// Load and optimize a model file
    pub fn load(path: &Path) -> Result<Self, CounterError> {
        info!("Loading heatmap model from {}", path.display());

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load heatmap model: {}", e);
                CounterError::ModelLoad(e.to_string())
            })?;

        Ok(Self { session })
    }
}

impl HeatmapModel for OnnxHeatmapModel {
    fn infer(&self, input: &Array4<u16>) -> Result<Array2<f32>, CounterError> {
        let inputs =
            ort::inputs![input.clone()].map_err(|e| CounterError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| CounterError::Inference(e.to_string()))?;

        let tensor = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| CounterError::Inference(e.to_string()))?;
        heatmap_from_output(tensor)
    }
}

/// Take the single plane out of a `[1, 1, rows, cols]` output
pub fn heatmap_from_output(output: ArrayViewD<'_, f32>) -> Result<Array2<f32>, CounterError> {
    let shape = output.shape().to_vec();
    if shape.len() != 4 || shape[0] != 1 || shape[1] != 1 {
        return Err(CounterError::OutputShape(shape));
    }

    let plane = output
        .into_dimensionality::<Ix4>()
        .map_err(|_| CounterError::OutputShape(shape.clone()))?
        .index_axis_move(Axis(0), 0)
        .index_axis_move(Axis(0), 0);
    debug!("Heatmap {}x{}", shape[2], shape[3]);
    Ok(plane.to_owned())
}

/// Model returning a fixed heatmap regardless of input.
///
/// Used when no model file is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticHeatmapModel {
    heatmap: Option<Array2<f32>>,
}

impl StaticHeatmapModel {
    pub fn new(heatmap: Array2<f32>) -> Self {
        Self {
            heatmap: Some(heatmap),
        }
    }

    /// A model whose every inference fails
    pub fn failing() -> Self {
        Self { heatmap: None }
    }

    /// A model that never sees a face
    pub fn empty() -> Self {
        Self::new(Array2::zeros((60, 80)))
    }
}

impl HeatmapModel for StaticHeatmapModel {
    fn infer(&self, _input: &Array4<u16>) -> Result<Array2<f32>, CounterError> {
        self.heatmap
            .clone()
            .ok_or_else(|| CounterError::Inference("static model has no heatmap".to_string()))
    }
}
