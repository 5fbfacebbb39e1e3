// Repair stage: remove the source glyphs, falling back to flat fill

use image::RgbaImage;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::core::backends::RepairMethod;
use crate::core::errors::ServiceResult;
use crate::core::params::RunParameters;
use crate::core::types::{Degradation, Fallback, Region, Stage, StageOutcome};
use crate::services::capabilities::Bound;
use crate::services::dispatch::Dispatcher;
use crate::services::repair::{RepairOutput, Repairer};

pub struct RepairPhase {
    dispatcher: Dispatcher,
    flat_fill: Arc<dyn Repairer>,
}

impl RepairPhase {
    pub fn new(dispatcher: Dispatcher, flat_fill: Arc<dyn Repairer>) -> Self {
        Self {
            dispatcher,
            flat_fill,
        }
    }

    #[instrument(skip_all, fields(method = %bound.backend, regions = regions.len()))]
    pub async fn execute(
        &self,
        image: &RgbaImage,
        regions: &[Region],
        params: &RunParameters,
        bound: &Bound<RepairMethod, dyn Repairer>,
    ) -> ServiceResult<StageOutcome<RepairOutput>> {
        let provider = bound.provider.as_ref();
        let fill_color = params.fill_color;
        let result = self
            .dispatcher
            .call(bound.backend, 0, params.retry, || {
                provider.repair(image, regions, fill_color)
            })
            .await;

        let err = match result {
            Ok(output) => return Ok(StageOutcome::Succeeded(output)),
            Err(err) => err,
        };

        if err.is_configuration() || !params.degrade_on_failure || bound.backend == RepairMethod::FlatFill {
            return Err(err);
        }

        warn!("{} repair failed, falling back to flat fill: {}", bound.backend, err);
        let output = self.flat_fill.repair(image, regions, fill_color).await?;
        Ok(StageOutcome::Degraded {
            value: output,
            degradations: vec![Degradation {
                stage: Stage::Repair,
                fallback: Fallback::FlatFill,
                reason: err.to_string(),
            }],
        })
    }
}
