pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{OptimizerError, OptimizerResult, PathError, ValidationError};
pub use validation::{validate_config, validate_settings};
pub use formats::{ImageFormat, format_from_extension, is_supported_image};
pub use fs::{modified_at, write_atomic};
