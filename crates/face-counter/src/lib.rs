//! Face Counter
//!
//! Counts faces in camera frames and serves the latest count:
//! - Frame preprocessing into the model's 16-bit grayscale tensor
//! - Heatmap inference behind the [`HeatmapModel`] seam (ONNX via `ort`)
//! - Heatmap decoding into face boxes
//! - Last-write-wins count store exposed over HTTP (`/face-count`)
//! - A counting loop that publishes at a bounded rate

pub mod config;
pub mod counter_loop;
pub mod detector;
pub mod model;
pub mod preprocess;
pub mod server;

pub use config::CounterConfig;
pub use counter_loop::{CountLoop, CountSink, CountSummary, FrameSource, StillImageSource};
pub use detector::FaceDetector;
pub use model::{HeatmapModel, OnnxHeatmapModel, StaticHeatmapModel};
pub use preprocess::{load_image, preprocess};
pub use server::{create_router, serve, AppState, CountReading, CountStore, SharedState};

pub use signal_clients::init_logging;

use thiserror::Error;

/// Face counter error types
#[derive(Error, Debug)]
pub enum CounterError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected heatmap shape: {0:?}")]
    OutputShape(Vec<usize>),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Publish failed: {0}")]
    Publish(String),
}

impl From<::config::ConfigError> for CounterError {
    fn from(err: ::config::ConfigError) -> Self {
        CounterError::Config(err.to_string())
    }
}
