pub mod image_ops;
pub mod logging;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{
    crop_region, encode_png_async, encode_png_sync, fill_regions,
};
pub use logging::init_tracing;
pub use metrics::{Metrics, MetricsSnapshot};
