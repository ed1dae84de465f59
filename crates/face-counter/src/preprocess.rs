//! Frame preprocessing
//!
//! The heatmap model takes a single 640x480 grayscale plane at 16-bit depth.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use std::path::Path;

use crate::CounterError;

/// Model input width
pub const INPUT_WIDTH: u32 = 640;

/// Model input height
pub const INPUT_HEIGHT: u32 = 480;

/// 8-bit to 16-bit scale (255 * 257 = 65535)
const DEPTH_SCALE: u16 = 257;

/// Convert a frame into the model input tensor `[1, 1, 480, 640]`
pub fn preprocess(image: &DynamicImage) -> Array4<u16> {
    let gray = image
        .resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle)
        .to_luma8();

    Array4::from_shape_fn(
        (1, 1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
        |(_, _, y, x)| gray.get_pixel(x as u32, y as u32)[0] as u16 * DEPTH_SCALE,
    )
}

/// Read an image file from disk
pub fn load_image(path: &Path) -> Result<DynamicImage, CounterError> {
    image::open(path)
        .map_err(|e| CounterError::ImageProcessing(format!("{}: {}", path.display(), e)))
}
