//! Maps the configured quality onto format-specific encoders.

use std::borrow::Cow;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use crate::utils::{ImageFormat, OptimizerResult};

/// Below this quality PNG output trades encode time for size.
const PNG_BEST_COMPRESSION_BELOW: u8 = 50;

/// PNG is lossless; the nearest knob to "quality" is how hard zlib works.
fn png_compression(quality: u8) -> CompressionType {
    if quality < PNG_BEST_COMPRESSION_BELOW {
        CompressionType::Best
    } else {
        CompressionType::Default
    }
}

/// JPEG has no alpha channel and no 16-bit samples.
fn jpeg_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

/// Encodes `image` as `format` into memory.
pub fn encode_image(image: &DynamicImage, format: ImageFormat, quality: u8) -> OptimizerResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::JPEG => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            jpeg_compatible(image).write_with_encoder(encoder)?;
        }
        ImageFormat::PNG => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, png_compression(quality), PngFilter::Adaptive);
            image.write_with_encoder(encoder)?;
        }
    }
    Ok(buf)
}
