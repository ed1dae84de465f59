//! Counting loop
//!
//! Pulls frames, counts faces, and publishes the count at a bounded rate.

use async_trait::async_trait;
use image::DynamicImage;
use signal_clients::FaceCountClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::detector::FaceDetector;
use crate::preprocess::load_image;
use crate::server::SharedState;
use crate::CounterError;

/// Source of frames to count
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted
    async fn next_frame(&mut self) -> Result<Option<DynamicImage>, CounterError>;
}

/// Re-reads one image file for every frame
pub struct StillImageSource {
    path: PathBuf,
    remaining: Option<u64>,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remaining: None,
        }
    }

    /// Stop after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }
}

#[async_trait]
impl FrameSource for StillImageSource {
    async fn next_frame(&mut self) -> Result<Option<DynamicImage>, CounterError> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }

        let path = self.path.clone();
        let image = tokio::task::spawn_blocking(move || load_image(&path))
            .await
            .map_err(|e| CounterError::ImageProcessing(e.to_string()))??;
        Ok(Some(image))
    }
}

/// Destination for published counts
#[async_trait]
pub trait CountSink: Send + Sync {
    async fn publish(&self, count: u32, camera_id: Option<u32>) -> Result<(), CounterError>;
}

/// In-process publish straight into the API state
#[async_trait]
impl CountSink for SharedState {
    async fn publish(&self, count: u32, camera_id: Option<u32>) -> Result<(), CounterError> {
        self.write().await.counts.publish(count, camera_id);
        Ok(())
    }
}

/// Publish to a (possibly remote) face-count endpoint
#[async_trait]
impl CountSink for FaceCountClient {
    async fn publish(&self, count: u32, camera_id: Option<u32>) -> Result<(), CounterError> {
        FaceCountClient::publish(self, count, camera_id)
            .await
            .map_err(|e| CounterError::Publish(e.to_string()))
    }
}

/// What a finished loop did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSummary {
    pub frames: u64,
    pub published: u64,
    pub last_count: Option<u32>,
}

/// Frame counting loop
pub struct CountLoop {
    detector: Arc<FaceDetector>,
    sink: Box<dyn CountSink>,
    camera_id: Option<u32>,
    publish_interval: Duration,
    frame_interval: Duration,
}

impl CountLoop {
    pub fn new(detector: Arc<FaceDetector>, sink: Box<dyn CountSink>) -> Self {
        Self {
            detector,
            sink,
            camera_id: None,
            publish_interval: Duration::from_secs(1),
            frame_interval: Duration::from_millis(100),
        }
    }

    pub fn with_camera_id(mut self, camera_id: u32) -> Self {
        self.camera_id = Some(camera_id);
        self
    }

    /// Minimum time between two publishes
    pub fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    /// Delay between frames
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Count frames until the source runs dry or `cancel` fires
    pub async fn run(
        &self,
        source: &mut dyn FrameSource,
        cancel: CancellationToken,
    ) -> CountSummary {
        info!(
            "Counting loop started (publish every {:?}, camera {:?})",
            self.publish_interval, self.camera_id
        );
        let mut summary = CountSummary::default();
        let mut last_publish: Option<Instant> = None;

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                frame = source.next_frame() => frame,
            };

            match frame {
                Ok(Some(image)) => {
                    let count = self.count(image).await;
                    summary.frames += 1;
                    summary.last_count = Some(count);

                    let due = last_publish.map_or(true, |at| at.elapsed() >= self.publish_interval);
                    if due {
                        match self.sink.publish(count, self.camera_id).await {
                            Ok(()) => summary.published += 1,
                            Err(e) => warn!("Failed to publish face count: {}", e),
                        }
                        last_publish = Some(Instant::now());
                    }
                }
                Ok(None) => {
                    info!("Frame source exhausted");
                    break;
                }
                Err(e) => warn!("Failed to read frame: {}", e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.frame_interval) => {}
            }
        }

        info!(
            "Counting loop stopped after {} frames ({} published)",
            summary.frames, summary.published
        );
        summary
    }

    async fn count(&self, image: DynamicImage) -> u32 {
        let detector = Arc::clone(&self.detector);
        match tokio::task::spawn_blocking(move || detector.count_faces(&image)).await {
            Ok(count) => {
                debug!("Frame face count: {}", count);
                count as u32
            }
            Err(e) => {
                warn!("Face detection task failed: {}", e);
                0
            }
        }
    }
}
