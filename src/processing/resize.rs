//! Proportional downscale applied to every eligible image.

use image::DynamicImage;
use image::imageops::FilterType;

/// Scales one dimension to `percent` of its size.
///
/// Rounds half up in integer arithmetic and never returns 0, so
/// 1000 px at 70% is exactly 700 px and a 1 px edge stays 1 px.
pub fn scale_dimension(dim: u32, percent: u32) -> u32 {
    let scaled = (u64::from(dim) * u64::from(percent) + 50) / 100;
    scaled.clamp(1, u64::from(u32::MAX)) as u32
}

/// Target dimensions for an image of `width`×`height`.
pub fn scaled_dimensions(width: u32, height: u32, percent: u32) -> (u32, u32) {
    (scale_dimension(width, percent), scale_dimension(height, percent))
}

/// Resizes both dimensions by `percent` with bilinear filtering.
pub fn apply_scale(image: &DynamicImage, percent: u32) -> DynamicImage {
    let (width, height) = scaled_dimensions(image.width(), image.height(), percent);
    image.resize_exact(width, height, FilterType::Triangle)
}
