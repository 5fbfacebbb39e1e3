// Detect stage: locate text regions, or take the caller's regions as given

use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::params::RunParameters;
use crate::core::types::Region;
use crate::services::detection::Detector;

pub struct DetectionPhase {
    detector: Arc<dyn Detector>,
}

impl DetectionPhase {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }

    /// Regions for this run. Detection never fails; an empty list ends the run early.
    #[instrument(skip(self, image, params), fields(
        width = image.width(),
        height = image.height(),
        provided = params.provided_regions.is_some()
    ))]
    pub async fn execute(&self, image: &RgbaImage, params: &RunParameters) -> Vec<Region> {
        if let Some(regions) = &params.provided_regions {
            debug!("Using {} caller-provided regions", regions.len());
            return regions.clone();
        }

        let regions = self
            .detector
            .detect(image, params.confidence_threshold)
            .await;
        debug!("Detected {} regions", regions.len());
        regions
    }
}
