// Recognize stage: read the source text of every region

use image::RgbaImage;
use std::slice;
use tracing::{debug, instrument, warn};

use crate::core::backends::{BackendKind, RecognizerBackend};
use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::params::RunParameters;
use crate::core::types::{Degradation, Fallback, Region, Stage, StageOutcome};
use crate::services::capabilities::Bound;
use crate::services::dispatch::Dispatcher;
use crate::services::ocr::{RecognitionRequest, Recognizer};

pub struct RecognitionPhase {
    dispatcher: Dispatcher,
}

impl RecognitionPhase {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// One text per region, in region order.
    ///
    /// Remote backends get one rate-limited call per region; local backends
    /// read all regions in a single call. When degradation is allowed, a
    /// region whose call fails transiently reads as empty text.
    #[instrument(skip_all, fields(backend = %bound.backend, regions = regions.len()))]
    pub async fn execute(
        &self,
        image: &RgbaImage,
        regions: &[Region],
        params: &RunParameters,
        bound: &Bound<RecognizerBackend, dyn Recognizer>,
    ) -> ServiceResult<StageOutcome<Vec<String>>> {
        if regions.is_empty() {
            return Ok(StageOutcome::Succeeded(Vec::new()));
        }

        let request = RecognitionRequest {
            backend: bound.backend,
            source_language: &params.source_language,
            credentials: &params.recognition_credentials,
            json_response: params.json_response,
        };

        if !bound.backend.is_remote() {
            return match self.call(image, regions, params, bound, &request).await {
                Ok(texts) => Ok(StageOutcome::Succeeded(texts)),
                Err(err) => {
                    let degradations = Self::degrade(params, &err, 0..regions.len())?;
                    Ok(StageOutcome::Degraded {
                        value: vec![String::new(); regions.len()],
                        degradations,
                    })
                }
            };
        }

        let mut texts = Vec::with_capacity(regions.len());
        let mut degradations = Vec::new();
        for (index, region) in regions.iter().enumerate() {
            match self
                .call(image, slice::from_ref(region), params, bound, &request)
                .await
            {
                Ok(mut text) => texts.push(text.pop().unwrap_or_default()),
                Err(err) => {
                    degradations.extend(Self::degrade(params, &err, index..index + 1)?);
                    texts.push(String::new());
                }
            }
        }

        debug!(
            "Recognized {}/{} regions",
            texts.iter().filter(|t| !t.is_empty()).count(),
            texts.len()
        );

        if degradations.is_empty() {
            Ok(StageOutcome::Succeeded(texts))
        } else {
            Ok(StageOutcome::Degraded {
                value: texts,
                degradations,
            })
        }
    }

    async fn call(
        &self,
        image: &RgbaImage,
        regions: &[Region],
        params: &RunParameters,
        bound: &Bound<RecognizerBackend, dyn Recognizer>,
        request: &RecognitionRequest<'_>,
    ) -> ServiceResult<Vec<String>> {
        let provider = bound.provider.as_ref();
        let mut texts = self
            .dispatcher
            .call(bound.backend, params.rpm_recognition, params.retry, || {
                provider.recognize(image, regions, request)
            })
            .await?;

        if texts.len() != regions.len() {
            warn!(
                "{} returned {} texts for {} regions",
                bound.backend,
                texts.len(),
                regions.len()
            );
            texts.resize(regions.len(), String::new());
        }
        Ok(texts)
    }

    /// Turn a failure into empty-text degradations, or hand it back when it must surface.
    fn degrade(
        params: &RunParameters,
        err: &ServiceError,
        regions: std::ops::Range<usize>,
    ) -> ServiceResult<Vec<Degradation>> {
        if err.is_configuration() || !params.degrade_on_failure {
            return Err(err.clone());
        }
        warn!("Recognition failed for regions {:?}, leaving them empty: {}", regions, err);
        Ok(regions
            .map(|region| Degradation {
                stage: Stage::Recognize,
                fallback: Fallback::EmptyText { region },
                reason: err.to_string(),
            })
            .collect())
    }
}
