mod audit;
mod discovery;
mod formats;
mod optimizer;
mod resize;

pub use audit::{AuditLog, AuditRecord};
pub use discovery::{partition, DispatchSummary, ImageDiscovery};
pub use formats::encode_image;
pub use optimizer::BatchOptimizer;
pub use resize::{apply_scale, scale_dimension, scaled_dimensions};
