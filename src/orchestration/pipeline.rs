// Pipeline orchestrator: drives one image through every stage and boundary

use image::RgbaImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::core::config::Config;
use crate::core::errors::{PipelineError, StageContext};
use crate::core::params::RunParameters;
use crate::core::types::{PipelineResult, RegionTranslation, RunOutcome, Stage, StageData};
use crate::extensions::{Boundary, ExtensionRegistry};
use crate::middleware::RateLimiter;
use crate::orchestration::cancel::CancelSignal;
use crate::orchestration::invariants::align_to_regions;
use crate::phases::{DetectionPhase, RecognitionPhase, RenderingPhase, RepairPhase, TranslationPhase};
use crate::services::capabilities::Capabilities;
use crate::services::dispatch::Dispatcher;
use crate::services::repair::FlatFillRepairer;
use crate::utils::Metrics;

/// Runs detect, recognize, translate, repair and render with extension
/// boundaries around each stage.
///
/// One orchestrator serves any number of concurrent runs; each run owns its
/// working data, while the rate limiter, registry and metrics are shared.
pub struct PipelineOrchestrator {
    capabilities: Arc<Capabilities>,
    extensions: ExtensionRegistry,
    metrics: Metrics,
    detection: DetectionPhase,
    recognition: RecognitionPhase,
    translation: TranslationPhase,
    repair: RepairPhase,
    rendering: RenderingPhase,
}

impl PipelineOrchestrator {
    pub fn new(
        capabilities: Arc<Capabilities>,
        extensions: ExtensionRegistry,
        limiter: RateLimiter,
        metrics: Metrics,
    ) -> Self {
        let dispatcher = Dispatcher::new(limiter, metrics.clone());
        Self {
            detection: DetectionPhase::new(Arc::clone(capabilities.detector())),
            recognition: RecognitionPhase::new(dispatcher.clone()),
            translation: TranslationPhase::new(dispatcher.clone()),
            repair: RepairPhase::new(dispatcher, Arc::clone(capabilities.flat_fill())),
            rendering: RenderingPhase::new(Arc::clone(capabilities.renderer())),
            capabilities,
            extensions,
            metrics,
        }
    }

    /// Orchestrator with a fresh limiter, registry and metrics set up from `config`
    pub fn from_config(config: &Config, capabilities: Arc<Capabilities>) -> Self {
        let metrics = Metrics::new();
        let extensions = ExtensionRegistry::with_defaults(config.extension_defaults().clone())
            .with_metrics(metrics.clone());
        let limiter = RateLimiter::with_window(config.rate_limit_window());
        Self::new(capabilities, extensions, limiter, metrics)
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub async fn run(
        &self,
        image: RgbaImage,
        params: RunParameters,
    ) -> Result<RunOutcome, PipelineError> {
        self.run_with_cancel(image, params, &CancelSignal::new()).await
    }

    /// Decode an uploaded image and run it
    pub async fn run_encoded(
        &self,
        bytes: &[u8],
        params: RunParameters,
    ) -> Result<RunOutcome, PipelineError> {
        let image = match image::load_from_memory(bytes) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(err) => {
                self.metrics.record_run_failed();
                error!("Run failed (invalid_image): {}", err);
                return Err(err.into());
            }
        };
        self.run(image, params).await
    }

    /// Run the pipeline, checking `cancel` before every stage.
    ///
    /// A cancelled run returns `RunOutcome::Cancelled` naming the stage that
    /// did not start; no partial result is produced.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub async fn run_with_cancel(
        &self,
        image: RgbaImage,
        params: RunParameters,
        cancel: &CancelSignal,
    ) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let outcome = self.execute(image, params, cancel).await;

        match &outcome {
            Ok(RunOutcome::Completed(result)) => {
                self.metrics.record_degradations(result.degradations.len());
                self.metrics.record_run_completed(result.len());
                info!(
                    "Run completed in {:.2}s: {} regions, {} degradations",
                    started.elapsed().as_secs_f64(),
                    result.len(),
                    result.degradations.len()
                );
            }
            Ok(RunOutcome::Cancelled { before }) => {
                self.metrics.record_run_cancelled();
                info!("Run cancelled before {}", before);
            }
            Err(err) => {
                self.metrics.record_run_failed();
                error!("Run failed ({}): {}", err.reason_code(), err);
            }
        }
        outcome
    }

    async fn execute(
        &self,
        image: RgbaImage,
        params: RunParameters,
        cancel: &CancelSignal,
    ) -> Result<RunOutcome, PipelineError> {
        let mut params = Arc::new(params);
        // Returned untouched when detection finds nothing, whatever extensions did to the working copy
        let original = image.clone();
        let mut data = StageData::new(image);
        let mut degradations = Vec::new();

        // Start
        if let Some(cancelled) = checkpoint(cancel, Stage::Start) {
            return Ok(cancelled);
        }
        self.fire(Boundary::BeforeRun, &mut data, &mut params);
        let backends = self.capabilities.resolve(&params)?;
        info!("Run parameters: {}", params.summary());

        // Detect
        if let Some(cancelled) = checkpoint(cancel, Stage::Detect) {
            return Ok(cancelled);
        }
        self.fire(Boundary::BeforeDetection, &mut data, &mut params);
        let timer = Instant::now();
        data.regions = self.detection.execute(&data.image, &params).await;
        let count = data.regions.len();
        data.texts = vec![String::new(); count];
        data.translations = vec![RegionTranslation::default(); count];
        data.styles = vec![params.default_style.clone(); count];
        self.metrics.record_stage_duration(Stage::Detect, timer.elapsed());
        self.fire(Boundary::AfterDetection, &mut data, &mut params);

        if data.regions.is_empty() {
            info!("No text regions found, returning the input image");
            return Ok(RunOutcome::Completed(PipelineResult::empty(original)));
        }

        // Recognize
        if let Some(cancelled) = checkpoint(cancel, Stage::Recognize) {
            return Ok(cancelled);
        }
        self.fire(Boundary::BeforeRecognition, &mut data, &mut params);
        let timer = Instant::now();
        match &backends.recognizer {
            Some(bound) => {
                let (texts, degraded) = self
                    .recognition
                    .execute(&data.image, &data.regions, &params, bound)
                    .await
                    .in_stage(Stage::Recognize)?
                    .into_parts();
                data.texts = texts;
                degradations.extend(degraded);
            }
            None => {
                debug!("Recognition skipped");
                data.texts = vec![String::new(); data.regions.len()];
            }
        }
        self.metrics.record_stage_duration(Stage::Recognize, timer.elapsed());
        self.fire(Boundary::AfterRecognition, &mut data, &mut params);

        // Translate
        if let Some(cancelled) = checkpoint(cancel, Stage::Translate) {
            return Ok(cancelled);
        }
        self.fire(Boundary::BeforeTranslation, &mut data, &mut params);
        let timer = Instant::now();
        match &backends.translator {
            Some(bound) => {
                let (translations, degraded) = self
                    .translation
                    .execute(&data.texts, &params, bound)
                    .await
                    .in_stage(Stage::Translate)?
                    .into_parts();
                data.translations = translations;
                degradations.extend(degraded);
            }
            None => {
                debug!("Translation skipped");
                data.translations = vec![RegionTranslation::default(); data.regions.len()];
            }
        }
        self.metrics.record_stage_duration(Stage::Translate, timer.elapsed());
        self.fire(Boundary::AfterTranslation, &mut data, &mut params);

        // Repair
        if let Some(cancelled) = checkpoint(cancel, Stage::Repair) {
            return Ok(cancelled);
        }
        self.fire(Boundary::BeforeRepair, &mut data, &mut params);
        let timer = Instant::now();
        let (output, degraded) = self
            .repair
            .execute(&data.image, &data.regions, &params, &backends.repairer)
            .await
            .in_stage(Stage::Repair)?
            .into_parts();
        data.image = output.image;
        data.clean_background = output.clean_background;
        degradations.extend(degraded);
        self.metrics.record_stage_duration(Stage::Repair, timer.elapsed());
        self.fire(Boundary::AfterRepair, &mut data, &mut params);

        // Render
        if let Some(cancelled) = checkpoint(cancel, Stage::Render) {
            return Ok(cancelled);
        }
        self.fire(Boundary::BeforeRender, &mut data, &mut params);
        let timer = Instant::now();
        self.rendering
            .execute(&mut data.image, &data.translations, &data.regions, &data.styles)
            .await
            .in_stage(Stage::Render)?;
        self.metrics.record_stage_duration(Stage::Render, timer.elapsed());
        self.fire(Boundary::AfterRender, &mut data, &mut params);

        // Done
        if let Some(cancelled) = checkpoint(cancel, Stage::Done) {
            return Ok(cancelled);
        }
        self.fire(Boundary::AfterRun, &mut data, &mut params);

        Ok(RunOutcome::Completed(PipelineResult {
            image: data.image,
            clean_background: data.clean_background,
            texts: data.texts,
            translations: data.translations,
            regions: data.regions,
            styles: data.styles,
            degradations,
        }))
    }

    /// Redraw a finished result after its translations or styles were edited.
    ///
    /// Rendering starts from the stored clean background, so repeated calls
    /// with the same values give identical images. A result without one gets
    /// a flat-filled background first, which is then kept on the result.
    #[instrument(skip_all, fields(regions = result.len()))]
    pub async fn rerender(
        &self,
        result: &mut PipelineResult,
        params: &RunParameters,
    ) -> Result<(), PipelineError> {
        let repaired = align_to_regions(
            result.regions.len(),
            &mut result.texts,
            &mut result.translations,
            &mut result.styles,
            &params.default_style,
        );
        self.record_repairs(repaired);

        let background = match &result.clean_background {
            Some(background) => background.clone(),
            None => {
                debug!("No clean background stored, flat-filling regions");
                let filled = FlatFillRepairer::fill(&result.image, &result.regions, params.fill_color);
                result.clean_background = Some(filled.clone());
                filled
            }
        };

        let mut image = background;
        self.rendering
            .execute(&mut image, &result.translations, &result.regions, &result.styles)
            .await
            .in_stage(Stage::Render)?;
        result.image = image;
        Ok(())
    }

    /// Fire a boundary, then restore per-region alignment.
    fn fire(&self, boundary: Boundary, data: &mut StageData, params: &mut Arc<RunParameters>) {
        let replaced = self.extensions.fire(boundary, data, params);
        if replaced > 0 {
            debug!("{} extension(s) replaced values at {}", replaced, boundary);
        }
        let repaired = align_to_regions(
            data.regions.len(),
            &mut data.texts,
            &mut data.translations,
            &mut data.styles,
            &params.default_style,
        );
        self.record_repairs(repaired);
    }

    fn record_repairs(&self, repaired: usize) {
        for _ in 0..repaired {
            self.metrics.record_invariant_repair();
        }
    }
}

fn checkpoint(cancel: &CancelSignal, next: Stage) -> Option<RunOutcome> {
    cancel
        .is_cancelled()
        .then_some(RunOutcome::Cancelled { before: next })
}
