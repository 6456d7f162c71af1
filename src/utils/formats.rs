use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use crate::utils::OptimizerError;

/// Image formats the pipeline knows how to recompress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    JPEG,
    PNG,
}

impl ImageFormat {
    /// Maps a format detected by the `image` crate onto the supported set.
    pub fn from_detected(format: image::ImageFormat) -> Result<Self, OptimizerError> {
        match format {
            image::ImageFormat::Jpeg => Ok(Self::JPEG),
            image::ImageFormat::Png => Ok(Self::PNG),
            other => Err(OptimizerError::format(format!(
                "Unsupported image format: {other:?}"
            ))),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = OptimizerError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Ok(Self::JPEG),
            "png" => Ok(Self::PNG),
            _ => Err(OptimizerError::format(format!(
                "Unsupported image format: {}", ext
            ))),
        }
    }
}

/// Get format from file extension
pub fn format_from_extension(path: impl AsRef<Path>) -> Result<ImageFormat, OptimizerError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| OptimizerError::format(
            format!("File has no extension: {}", path.display())
        ))?;

    ImageFormat::from_str(ext)
}

/// True when `path` carries one of the extensions discovery collects.
pub fn is_supported_image(path: impl AsRef<Path>) -> bool {
    format_from_extension(path).is_ok()
}
