//! Rendering of image samples to grayscale PNG files.
//!
//! Samples are arbitrary floats (weights, mean images), so each one is
//! min-max scaled to `[0, 255]` before encoding.

use std::path::Path;

use image::GrayImage;

use crate::error::{Error, Result};
use crate::summary::record::ImageSample;

/// Whether `shape` can be rendered: `[rows, cols]` or `[rows, cols, 1]`.
pub fn is_image_shape(shape: &[usize]) -> bool {
    matches!(shape, [_, _] | [_, _, 1])
}

/// Converts a 2-D sample (`shape = [rows, cols]`) to an 8-bit grayscale image.
pub fn sample_to_gray(sample: &ImageSample) -> Result<GrayImage> {
    let (rows, cols) = match sample.shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        [rows, cols, 1] => (*rows, *cols),
        other => {
            return Err(Error::Sampling(format!(
                "image samples must be 2-D, got shape {other:?}"
            )))
        }
    };
    if rows * cols != sample.data.len() {
        return Err(Error::Sampling(format!(
            "shape {rows}×{cols} needs {} values, got {}",
            rows * cols,
            sample.data.len()
        )));
    }

    let (lo, hi) = sample
        .data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;

    let pixels: Vec<u8> = sample
        .data
        .iter()
        .map(|&v| {
            if !v.is_finite() || !(range > 0.0) {
                0
            } else {
                (((v - lo) / range) * 255.0).round() as u8
            }
        })
        .collect();

    GrayImage::from_raw(cols as u32, rows as u32, pixels)
        .ok_or_else(|| Error::Sampling("pixel buffer does not match image size".into()))
}

/// Writes `sample` to `path` as a PNG.
pub fn save_png(sample: &ImageSample, path: &Path) -> Result<()> {
    sample_to_gray(sample)?.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
